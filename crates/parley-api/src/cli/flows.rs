//! `parley flows`: configured flows and their transition graphs.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use parley_core::conversation::flow::ConversationFlow;

use crate::state::AppState;

pub fn list_flows(state: &AppState, json: bool) -> Result<()> {
    if json {
        let flows: Vec<serde_json::Value> = state.flows.values().map(flow_json).collect();
        println!("{}", serde_json::to_string_pretty(&flows)?);
        return Ok(());
    }

    if state.flows.is_empty() {
        println!();
        println!(
            "  {} No flows configured. Add a {} section to {}",
            style("i").blue().bold(),
            style("[[flows]]").yellow(),
            style(state.config_path.display()).dim(),
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Flow").fg(Color::White),
        Cell::new("Entry").fg(Color::White),
        Cell::new("Agents").fg(Color::White),
        Cell::new("Max rounds").fg(Color::White),
        Cell::new("Selection").fg(Color::White),
        Cell::new("Manager").fg(Color::White),
    ]);

    for flow in state.flows.values() {
        let manager = match flow.manager() {
            Some(model) => Cell::new(&model.model),
            None => Cell::new("-").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(flow.name()).fg(Color::Cyan),
            Cell::new(flow.entry_agent()),
            Cell::new(flow.registry().len()),
            Cell::new(flow.max_round()),
            Cell::new(flow.selection_method()),
            manager,
        ]);
    }

    println!();
    println!("{table}");

    for flow in state.flows.values() {
        println!();
        println!("  {}", style(format!("── {} ──", flow.name())).dim());
        for (from, next) in flow.graph().edges() {
            println!(
                "  {} {} {}",
                style(from).cyan(),
                style("→").dim(),
                next.join(", ")
            );
        }
    }
    println!();
    Ok(())
}

fn flow_json(flow: &ConversationFlow) -> serde_json::Value {
    serde_json::json!({
        "name": flow.name(),
        "entry_agent": flow.entry_agent(),
        "max_round": flow.max_round(),
        "selection_method": flow.selection_method(),
        "max_selection_retries": flow.max_selection_retries(),
        "manager_model": flow.manager().map(|m| m.model.clone()),
        "agents": flow.registry().names().collect::<Vec<_>>(),
        "transitions": flow.graph().edges(),
    })
}
