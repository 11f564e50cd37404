//! `parley agents`: rosters with their bound models.

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use parley_types::agent::{Agent, AgentRole};

use crate::state::AppState;

pub fn list_agents(state: &AppState, flow: Option<&str>, json: bool) -> Result<()> {
    if let Some(name) = flow {
        if !state.flows.contains_key(name) {
            bail!("unknown conversation flow '{name}'");
        }
    }

    let rows: Vec<(&str, &Agent)> = state
        .flows
        .values()
        .filter(|f| flow.is_none_or(|name| f.name() == name))
        .flat_map(|f| f.registry().agents().iter().map(move |a| (f.name(), a)))
        .collect();

    if json {
        let agents: Vec<serde_json::Value> = rows
            .iter()
            .map(|(flow, agent)| {
                serde_json::json!({
                    "flow": flow,
                    "agent": agent,
                    "bound_model": agent.model.as_ref().map(|m| m.model.clone()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&agents)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!();
        println!("  {} No agents configured.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Flow").fg(Color::White),
        Cell::new("Agent").fg(Color::White),
        Cell::new("Role").fg(Color::White),
        Cell::new("Model").fg(Color::White),
        Cell::new("Audit").fg(Color::White),
        Cell::new("In response").fg(Color::White),
        Cell::new("Tools").fg(Color::White),
    ]);

    for (flow, agent) in &rows {
        let role = match agent.role {
            AgentRole::UserProxy => Cell::new("user_proxy").fg(Color::DarkGrey),
            AgentRole::Planner => Cell::new("planner").fg(Color::Magenta),
            AgentRole::Researcher => Cell::new("researcher").fg(Color::Blue),
            AgentRole::Specialist => Cell::new("specialist").fg(Color::Yellow),
        };
        let model = if agent.role.consults_model() {
            Cell::new(&agent.model_name)
        } else {
            Cell::new("-").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(flow),
            Cell::new(agent.display_name()).fg(Color::Cyan),
            role,
            model,
            Cell::new(check(agent.log_to_audit)),
            Cell::new(check(agent.include_in_response)),
            Cell::new(if agent.tools.is_empty() {
                "-".to_string()
            } else {
                agent.tools.join(", ")
            }),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

fn check(on: bool) -> &'static str {
    if on { "✓" } else { "" }
}
