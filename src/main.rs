use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use viewswitch::node::same_node;
use viewswitch::registry::StateEntry;
use viewswitch::{NodeRef, PresentationSlot, SelectionOutcome, SwitcherConfig, TextNode, ViewSwitcher};

/// Drive a headless view switcher from a command script.
#[derive(Debug, Parser)]
#[command(name = "viewswitch", version)]
struct Cli {
    /// Inline views, one text node per label (e.g. a,b,c)
    #[arg(long, value_delimiter = ',', conflicts_with = "states")]
    views: Vec<String>,

    /// State entries as key=label pairs (e.g. home=Home,settings=Settings)
    #[arg(long, value_delimiter = ',')]
    states: Vec<String>,

    /// Config file to use instead of the user config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Script steps: goto:N, state:KEY, next, prev
    commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Goto(i64),
    State(String),
    Next,
    Prev,
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "next" => return Ok(Step::Next),
            "prev" => return Ok(Step::Prev),
            _ => {}
        }
        match raw.split_once(':') {
            Some(("goto", index)) => {
                let index = index
                    .parse()
                    .with_context(|| format!("Invalid index in step '{raw}'"))?;
                Ok(Step::Goto(index))
            }
            Some(("state", key)) => Ok(Step::State(key.to_string())),
            _ => bail!("Unknown step '{raw}' (expected goto:N, state:KEY, next or prev)"),
        }
    }
}

/// A labelled node the script can report on.
struct Labelled {
    label: String,
    node: NodeRef,
}

fn populate(switcher: &ViewSwitcher, cli: &Cli) -> anyhow::Result<Vec<Labelled>> {
    if !cli.views.is_empty() {
        let nodes: Vec<Labelled> = cli
            .views
            .iter()
            .map(|label| Labelled {
                label: label.clone(),
                node: Arc::new(TextNode::new(label.clone())),
            })
            .collect();
        switcher.set_views(nodes.iter().map(|entry| entry.node.clone()).collect());
        return Ok(nodes);
    }

    if !cli.states.is_empty() {
        let mut nodes = Vec::new();
        let mut entries = Vec::new();
        for pair in &cli.states {
            let (key, label) = pair.split_once('=').unwrap_or((pair.as_str(), pair.as_str()));
            let node: NodeRef = Arc::new(TextNode::new(label));
            entries.push(StateEntry::new(key).with_content(node.clone()));
            nodes.push(Labelled {
                label: label.to_string(),
                node,
            });
        }
        switcher.set_state_entries(entries);
        return Ok(nodes);
    }

    bail!("Nothing to switch between: pass --views or --states")
}

fn report(step: &str, switcher: &ViewSwitcher, nodes: &[Labelled], outcome: Option<SelectionOutcome>) {
    let index = switcher.selected_index().map_or(-1, |index| index as i64);
    let key = switcher.selected_state_key().unwrap_or_else(|| "-".to_string());
    let showing = switcher
        .current_node()
        .and_then(|current| nodes.iter().find(|entry| same_node(&entry.node, &current)))
        .map_or("-", |entry| entry.label.as_str());
    let slot = switcher.presenter().children().len();

    match outcome {
        Some(outcome) => println!("{step}: index={index} key={key} showing={showing} slot={slot} outcome={outcome:?}"),
        None => println!("{step}: index={index} key={key} showing={showing} slot={slot}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    viewswitch::init_tracing();
    let cli = Cli::parse();

    let steps = cli
        .commands
        .iter()
        .map(|raw| raw.parse::<Step>())
        .collect::<anyhow::Result<Vec<_>>>()?;

    let config = match &cli.config {
        Some(path) => SwitcherConfig::load_from(path)?,
        None => SwitcherConfig::load()?,
    };

    let slot = Arc::new(PresentationSlot::new());
    let switcher = ViewSwitcher::builder(slot).config(config).build()?;
    let nodes = populate(&switcher, &cli)?;
    switcher.settled().await;
    report("init", &switcher, &nodes, None);

    for (raw, step) in cli.commands.iter().zip(steps) {
        let outcome = match step {
            Step::Goto(index) => switcher.switch_to(index).await,
            Step::State(key) => switcher.switch_to_state(&key).await,
            Step::Next => switcher.next().await,
            Step::Prev => switcher.previous().await,
        };
        match outcome {
            Ok(outcome) => report(raw, &switcher, &nodes, Some(outcome)),
            Err(err) => {
                eprintln!("{raw}: {err}");
                report(raw, &switcher, &nodes, None);
            }
        }
    }

    switcher.shutdown().await;
    Ok(())
}
