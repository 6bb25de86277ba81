use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::cache::ViewCache;
use crate::config::SwitcherConfig;
use crate::error::SwitcherError;
use crate::factory::{ItemNodeFactory, ItemTemplate, TemplateSelector, ViewFactory};
use crate::lifecycle::LifecycleCoordinator;
use crate::node::{DataRef, Presenter};
use crate::registry::DescriptorRegistry;
use crate::selection::SelectionState;
use crate::transition::{AnimationCoordinator, TransitionCoordinator, TransitionSettings, ViewTransition};

use super::events::Handlers;
use super::queue::SelectionQueue;
use super::{EngineState, Presented, Shared, ViewSwitcher};

/// Assembles a [`ViewSwitcher`] from its collaborators.
pub struct ViewSwitcherBuilder {
    presenter: Arc<dyn Presenter>,
    animation: Option<Arc<dyn AnimationCoordinator>>,
    strategy: Option<Arc<dyn ViewTransition>>,
    config: SwitcherConfig,
    factory: ViewFactory,
    ambient_context: Option<DataRef>,
    runtime: Option<Handle>,
}

impl ViewSwitcherBuilder {
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self {
            presenter,
            animation: None,
            strategy: None,
            config: SwitcherConfig::default(),
            factory: ViewFactory::new(),
            ambient_context: None,
            runtime: None,
        }
    }

    /// Host animation service used for the default cross-fade.
    pub fn animation_coordinator(mut self, coordinator: Arc<dyn AnimationCoordinator>) -> Self {
        self.animation = Some(coordinator);
        self
    }

    pub fn transition_strategy(mut self, strategy: Arc<dyn ViewTransition>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn config(mut self, config: SwitcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn item_template(mut self, template: ItemTemplate) -> Self {
        self.factory.set_item_template(Some(template));
        self
    }

    pub fn item_template_selector(mut self, selector: TemplateSelector) -> Self {
        self.factory.set_item_template_selector(Some(selector));
        self
    }

    pub fn item_node_factory(mut self, factory: ItemNodeFactory) -> Self {
        self.factory.set_item_node_factory(Some(factory));
        self
    }

    pub fn ambient_context(mut self, context: DataRef) -> Self {
        self.ambient_context = Some(context);
        self
    }

    /// Runtime that runs selection operations. Defaults to the current one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<ViewSwitcher, SwitcherError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| SwitcherError::NoRuntime)?,
        };

        let config = self.config;
        let mut settings = TransitionSettings {
            animate: config.animate,
            duration: config.transition_duration(),
            easing: config.easing,
            ..TransitionSettings::default()
        };
        if let Some(strategy) = self.strategy {
            settings.strategy = strategy;
        }

        let state = EngineState {
            registry: DescriptorRegistry::new(),
            cache: ViewCache::new(config.cache_views),
            factory: self.factory,
            ambient_context: self.ambient_context,
            inherited: HashMap::new(),
            pending_disposal: Vec::new(),
            is_initial: true,
            presented: Presented::default(),
            automation_template: config.automation_description_template.clone(),
            automation_description: None,
            can_go_next: false,
            can_go_previous: false,
        };

        tracing::debug!(
            cache_views = config.cache_views,
            animate = config.animate,
            duration_ms = config.transition_duration_ms,
            index_behavior = ?config.index_behavior,
            "View switcher created"
        );

        Ok(ViewSwitcher {
            shared: Arc::new(Shared {
                runtime,
                selection: SelectionState::new(config.index_behavior),
                queue: SelectionQueue::new(),
                transitions: TransitionCoordinator::new(self.presenter, self.animation, settings),
                lifecycle: LifecycleCoordinator::new(),
                handlers: Handlers::default(),
                state: Mutex::new(state),
            }),
        })
    }
}
