//! `sleuth graph`: print the stage topology and merge policies.

use anyhow::Result;
use console::style;

use sleuth::config::SleuthConfig;
use sleuth::orchestrator::Orchestrator;
use sleuth::state::StateField;

pub fn cmd_graph() -> Result<()> {
    // Offline collaborators: building the graph must not touch the network.
    let config = SleuthConfig::default().with_offline(true);
    let orchestrator = Orchestrator::from_config(&config)?;
    let graph = orchestrator.graph();

    println!();
    println!("{}", style("Stages").bold());
    for (i, stage) in graph.order().iter().enumerate() {
        let Some(rule) = graph.rule(*stage) else {
            continue;
        };
        let marker = if *stage == graph.entry() { " (entry)" } else { "" };
        println!("  {}. {:<9} {}{}", i + 1, stage.to_string(), rule, style(marker).dim());
    }

    println!();
    println!("{}", style("State fields").bold());
    for field in StateField::ALL {
        let note = if field.is_immutable() { " (set once)" } else { "" };
        println!(
            "  {:<16} {:?}{}",
            field.name(),
            field.policy(),
            style(note).dim()
        );
    }
    println!();
    Ok(())
}
