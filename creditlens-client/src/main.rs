//! CreditLens headless driver.
//!
//! Resolves the default selection for the configured company, optionally
//! generates narratives or asks a question, and prints the resulting view
//! as JSON.

use std::sync::Arc;

use creditlens_client::api_client::RestClient;
use creditlens_client::config::ClientConfig;
use creditlens_client::error::ClientError;
use creditlens_client::persistence;
use creditlens_client::telemetry;
use creditlens_client::{Tab, ViewController};
use creditlens_core::CompanyId;

#[derive(Debug, Default, PartialEq)]
struct DriverArgs {
    company: Option<CompanyId>,
    tab: Option<Tab>,
    narratives: bool,
    question: Option<String>,
}

impl DriverArgs {
    fn parse<I>(args: I) -> Result<Self, ClientError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = DriverArgs::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    args.next();
                }
                "--company" => parsed.company = Some(CompanyId::new(required(&arg, args.next())?)),
                "--tab" => parsed.tab = Some(required(&arg, args.next())?.parse()?),
                "--ask" => parsed.question = Some(required(&arg, args.next())?),
                "--narratives" => parsed.narratives = true,
                other if other.starts_with("--config=") => {}
                other => {
                    return Err(ClientError::InvalidArgument(format!(
                        "unrecognized argument {}",
                        other
                    )))
                }
            }
        }
        Ok(parsed)
    }
}

fn required(flag: &str, value: Option<String>) -> Result<String, ClientError> {
    value.ok_or_else(|| ClientError::InvalidArgument(format!("{} requires a value", flag)))
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = ClientConfig::load()?;
    telemetry::init_tracing(&config.log)?;
    let args = DriverArgs::parse(std::env::args().skip(1))?;

    let backend = Arc::new(RestClient::new(&config)?);
    let mut controller = ViewController::new(backend, config.default_tab)
        .with_default_company(config.default_company.clone());
    match persistence::load(&config.persistence_path) {
        Ok(Some(state)) => controller.restore(&state),
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "Ignoring unreadable persisted state"),
    }
    if let Some(company) = args.company {
        controller = controller.with_default_company(Some(company));
    }
    if let Some(tab) = args.tab {
        controller.activate_tab(tab);
    }

    controller.start();
    controller.settle().await;

    if args.narratives {
        controller.request_commentary();
        controller.request_tab_insight();
        controller.settle().await;
    }
    if let Some(question) = &args.question {
        if !controller.ask(question) {
            tracing::warn!("Selection is not resolved; question not sent");
        }
        controller.settle().await;
    }

    let view = controller.view();
    println!("{}", serde_json::to_string_pretty(&view)?);

    if let Err(err) = persistence::save(&config.persistence_path, &controller.persisted_state()) {
        tracing::warn!(error = %err, "Failed to persist view state");
    }
    Ok(())
}
