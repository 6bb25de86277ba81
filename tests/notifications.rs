mod common;

use std::sync::Arc;

use parking_lot::Mutex;
use viewswitch::node::Item;
use viewswitch::registry::StateEntry;
use viewswitch::selection::IndexBehavior;
use viewswitch::switcher::SwitcherProperty;
use viewswitch::SwitcherConfig;

fn record_properties(switcher: &viewswitch::ViewSwitcher) -> Arc<Mutex<Vec<SwitcherProperty>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = seen.clone();
    switcher.on_property_changed(move |_, property| {
        record.lock().push(property);
        Ok(())
    });
    seen
}

#[tokio::test]
async fn test_observer_echo_does_not_requeue_selection() {
    let (_slot, switcher) = common::switcher();
    let (_mocks, nodes) = common::mock_nodes(&["A", "B", "C"]);
    switcher.set_views(nodes);
    switcher.settled().await;

    // A two-way binding that writes stale values back while the engine publishes.
    switcher.on_property_changed(|switcher, property| {
        match property {
            SwitcherProperty::SelectedIndex => switcher.set_selected_index(0),
            SwitcherProperty::SelectedStateKey => switcher.set_selected_state_key(Some("stale".to_string())),
            _ => {}
        }
        Ok(())
    });

    switcher.switch_to(2).await.unwrap();
    switcher.settled().await;

    assert_eq!(switcher.selected_index(), Some(2));
}

#[tokio::test]
async fn test_property_pushes_request_selection() {
    let (_slot, switcher) = common::switcher();
    switcher.set_state_entries(vec![StateEntry::new("home"), StateEntry::new("settings"), StateEntry::new("about")]);
    switcher.settled().await;

    switcher.set_selected_index(2);
    switcher.settled().await;
    assert_eq!(switcher.selected_state_key().as_deref(), Some("about"));

    switcher.set_selected_state_key(Some("settings".to_string()));
    switcher.settled().await;
    assert_eq!(switcher.selected_index(), Some(1));

    // Blank keys are not requests.
    switcher.set_selected_state_key(Some("  ".to_string()));
    switcher.set_selected_state_key(None);
    switcher.settled().await;
    assert_eq!(switcher.selected_index(), Some(1));

    switcher.set_selected_item(None);
    switcher.settled().await;
    assert_eq!(switcher.selected_index(), None);
    assert_eq!(switcher.selected_state_key(), None);
}

#[tokio::test]
async fn test_selected_item_push_matches_items_source() {
    let (_slot, switcher) = common::switcher();
    switcher.set_items_source(Some(vec![Item::data("x"), Item::data("y")]));
    switcher.settled().await;

    switcher.set_selected_item(Some(Item::data("y")));
    switcher.settled().await;

    assert_eq!(switcher.selected_index(), Some(1));
}

#[tokio::test]
async fn test_commit_publishes_changed_properties_only() {
    let (_slot, switcher) = common::switcher();
    let (_mocks, nodes) = common::mock_nodes(&["A", "B", "C"]);
    switcher.set_views(nodes);
    switcher.settled().await;
    let seen = record_properties(&switcher);

    switcher.switch_to(1).await.unwrap();

    let seen = seen.lock().clone();
    assert!(seen.contains(&SwitcherProperty::SelectedIndex));
    assert!(seen.contains(&SwitcherProperty::SelectedItem));
    assert!(!seen.contains(&SwitcherProperty::SelectedStateKey));
    assert!(seen.contains(&SwitcherProperty::CanGoPrevious));
    assert!(!seen.contains(&SwitcherProperty::CanGoNext));
}

#[tokio::test]
async fn test_navigation_flags_track_boundaries() {
    let (_slot, switcher) = common::switcher();
    let (_mocks, nodes) = common::mock_nodes(&["A", "B"]);
    switcher.set_views(nodes);
    switcher.settled().await;
    let seen = record_properties(&switcher);

    switcher.next().await.unwrap();

    assert!(!switcher.can_go_next());
    assert!(switcher.can_go_previous());
    let seen = seen.lock().clone();
    assert!(seen.contains(&SwitcherProperty::CanGoNext));
    assert!(seen.contains(&SwitcherProperty::CanGoPrevious));
}

#[tokio::test]
async fn test_wrap_policy_enables_both_directions() {
    let (_slot, switcher) = common::switcher();
    let (_mocks, nodes) = common::mock_nodes(&["A", "B"]);
    switcher.set_views(nodes);
    switcher.settled().await;
    assert!(!switcher.can_go_previous());

    switcher.set_index_behavior(IndexBehavior::Wrap);

    assert_eq!(switcher.index_behavior(), IndexBehavior::Wrap);
    assert!(switcher.can_go_next());
    assert!(switcher.can_go_previous());
}

#[tokio::test]
async fn test_empty_list_disables_navigation() {
    let (_slot, switcher) = common::switcher_with(SwitcherConfig {
        index_behavior: IndexBehavior::Wrap,
        ..SwitcherConfig::default()
    });

    assert!(!switcher.can_go_next());
    assert!(!switcher.can_go_previous());
    assert!(switcher.is_empty());
}

#[tokio::test]
async fn test_automation_description_follows_selection() {
    let (_slot, switcher) = common::switcher();
    switcher.set_automation_description_template(Some("Showing {0}".to_string()));
    switcher.set_state_entries(vec![StateEntry::new("home"), StateEntry::new("settings")]);
    switcher.settled().await;
    assert_eq!(switcher.automation_description().as_deref(), Some("Showing home"));
    let seen = record_properties(&switcher);

    switcher.switch_to_state("settings").await.unwrap();

    assert_eq!(switcher.automation_description().as_deref(), Some("Showing settings"));
    assert!(seen.lock().contains(&SwitcherProperty::AutomationDescription));

    switcher.set_automation_description_template(None);
    assert_eq!(switcher.automation_description(), None);
}

#[tokio::test]
async fn test_automation_description_uses_item_text() {
    let (_slot, switcher) = common::switcher();
    switcher.set_automation_description_template(Some("Tab {0}".to_string()));
    switcher.set_items_source(Some(vec![Item::data("inbox"), Item::data("outbox")]));
    switcher.settled().await;

    switcher.switch_to(1).await.unwrap();

    assert_eq!(switcher.automation_description().as_deref(), Some("Tab outbox"));
}

#[tokio::test]
async fn test_failing_handlers_do_not_block_selection() {
    let (_slot, switcher) = common::switcher();
    let (_mocks, nodes) = common::mock_nodes(&["A", "B"]);
    switcher.set_views(nodes);
    switcher.settled().await;
    switcher.on_selection_changing(|_, _| anyhow::bail!("changing handler broke"));
    switcher.on_selection_changed(|_, _| anyhow::bail!("changed handler broke"));
    switcher.on_property_changed(|_, _| anyhow::bail!("observer broke"));

    let outcome = switcher.switch_to(1).await.unwrap();

    assert_eq!(outcome, viewswitch::SelectionOutcome::Applied);
    assert_eq!(switcher.selected_index(), Some(1));
}
