//! Ask command implementation.

use crate::assistant::CourseAssistant;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, show_tools: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let assistant = CourseAssistant::from_settings(&settings)?;

    let spinner = Output::spinner("Thinking...");

    match assistant.query(question, None).await {
        Ok(response) => {
            spinner.finish_and_clear();

            if show_tools && !response.tool_calls.is_empty() {
                Output::header("Tool calls");
                for call in &response.tool_calls {
                    Output::tool_call(&call.to_string(), &call.result);
                }
            }

            println!("\n{}\n", response.answer);

            if !response.sources.is_empty() {
                Output::header("Sources");
                for source in &response.sources {
                    Output::source(source);
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
