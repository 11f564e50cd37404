//! `parley respond`: run one exchange and print the answer.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use parley_types::chat::{AgentChat, ChatRequest, ChatResponse};

use super::RespondArgs;
use crate::state::AppState;

/// Run the flow for the question and print the answer.
///
/// Ctrl-C cancels before the next round; nothing is written to memory
/// for a cancelled exchange.
///
/// # Examples
///
/// ```bash
/// parley respond --flow classification_agent "Do I need gloves in the lab?"
/// parley respond -f sql_manipulation_agent -t 0193... "and last month?"
/// ```
pub async fn respond(state: &AppState, args: RespondArgs, json: bool, verbose: u8) -> Result<()> {
    let (sender, mut receiver) = mpsc::unbounded_channel::<AgentChat>();
    let service = state.chat_service(Some(sender))?;

    let mut request = ChatRequest::new(args.flow, args.prompt.join(" "));
    request.thread_id = args.thread;
    request.thread_memory = args.memory;
    request.memory_record = !args.no_memory;
    request.event_type = args.event_type;
    request.topic = args.topic;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, stopping after the current round");
                cancel.cancel();
            }
        })
    };

    let result = service.get_chat_response(request, cancel).await;
    ctrl_c.abort();
    drop(service);

    let mut turns = Vec::new();
    while let Some(chat) = receiver.recv().await {
        turns.push(chat);
    }
    let response = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if verbose > 0 && !turns.is_empty() {
        print_turns(&turns);
    }
    print_response(&response);
    Ok(())
}

fn print_turns(turns: &[AgentChat]) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Started").fg(Color::White),
        Cell::new("From").fg(Color::White),
        Cell::new("To").fg(Color::White),
        Cell::new("Took").fg(Color::White),
        Cell::new("Tokens").fg(Color::White),
        Cell::new("Tools").fg(Color::White),
    ]);

    for turn in turns {
        let tools = turn.tool_results();
        let tools_cell = if tools.is_empty() {
            Cell::new("-").fg(Color::DarkGrey)
        } else if tools.iter().any(|t| t.is_error) {
            Cell::new(format!("{} (failed)", tools.len())).fg(Color::Red)
        } else {
            Cell::new(tools.len()).fg(Color::Green)
        };

        table.add_row(vec![
            Cell::new(turn.start_time_formatted()),
            Cell::new(turn.source()).fg(Color::Cyan),
            Cell::new(turn.target()).fg(Color::Cyan),
            Cell::new(turn.execution_time_formatted()),
            Cell::new(turn.usage().total()),
            tools_cell,
        ]);
    }

    println!();
    println!("{table}");
}

fn print_response(response: &ChatResponse) {
    println!();
    println!("{}", response.agent_response.trim());
    println!();
    println!(
        "  {} thread {}  {} {}/{} tokens",
        style("·").dim(),
        style(&response.thread_id).cyan(),
        style("·").dim(),
        response.token_count,
        response.max_token_count,
    );
    if response.token_count > response.max_token_count {
        println!(
            "  {} token count is above the configured maximum",
            style("!").yellow().bold()
        );
    }
    println!();
}
