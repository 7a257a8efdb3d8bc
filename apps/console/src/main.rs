use anyhow::{bail, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use client_core::{
    feedback, load_settings, ControlDescriptor, ControlRuntime, FeedbackKind, TransitionOutcome,
    WidgetView,
};
use shared::domain::{OrderId, Scope};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "order-controls", about = "Change order, payment and delivery states")]
struct Args {
    /// Overrides the configured transitions metadata endpoint.
    #[arg(long, global = true)]
    meta_url: Option<String>,
    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct OrderArgs {
    #[arg(long)]
    order_id: String,
    #[arg(long, default_value = "open")]
    order_state: String,
    #[arg(long, default_value = "open")]
    payment_state: String,
    #[arg(long, default_value = "open")]
    delivery_state: String,
    /// Set-state endpoint of the order; without it the controls are read-only.
    #[arg(long)]
    set_url: Option<String>,
}

impl OrderArgs {
    fn descriptors(&self) -> Vec<ControlDescriptor> {
        let order_id = OrderId::new(self.order_id.clone());
        [
            (Scope::Order, &self.order_state),
            (Scope::Payment, &self.payment_state),
            (Scope::Delivery, &self.delivery_state),
        ]
        .into_iter()
        .map(|(scope, state)| ControlDescriptor {
            order_id: order_id.clone(),
            scope,
            current_state: state.clone(),
            set_url: self.set_url.clone(),
        })
        .collect()
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the controls of one order with the actions on offer.
    Show {
        #[command(flatten)]
        order: OrderArgs,
    },
    /// Request one state transition and print the reconciled controls.
    Set {
        #[command(flatten)]
        order: OrderArgs,
        #[arg(long)]
        scope: Scope,
        #[arg(long)]
        action: String,
    },
    /// Fetch the transition graph from the backend and cache it.
    Refresh,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(meta_url) = args.meta_url {
        settings.meta_url = Some(meta_url);
    }
    let runtime = ControlRuntime::initialize(&settings).await?;

    match args.command {
        Command::Show { order } => {
            let page = runtime.bind_page(order.descriptors()).await;
            print_views(&page.views().await, args.json)?;
        }
        Command::Set {
            order,
            scope,
            action,
        } => {
            if order.set_url.is_none() {
                bail!("--set-url is required to change a state");
            }
            let order_id = OrderId::new(order.order_id.clone());
            let page = runtime.bind_page(order.descriptors()).await;
            let Some(outcome) = page.select(&order_id, scope, &action).await else {
                bail!("no {scope} control bound for order {order_id}");
            };
            print_outcome(&outcome, args.json)?;
            print_views(&page.views().await, args.json)?;
        }
        Command::Refresh => {
            let page = runtime.bind_page(Vec::new()).await;
            eprintln!("{}", feedback::REFRESH_LOADING);
            let status = page.refresh_transitions().await;
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "refreshed": status.refreshed,
                        "label": status.button_label,
                    })
                );
            } else {
                println!("{}", status.button_label);
            }
            if !status.refreshed {
                bail!("transition graph could not be refreshed");
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &TransitionOutcome, json: bool) -> Result<()> {
    let (kind, message) = match outcome {
        TransitionOutcome::Ignored(reason) => ("ignored", format!("{reason:?}")),
        TransitionOutcome::Applied { .. } => ("applied", feedback::SAVED.to_string()),
        TransitionOutcome::Rejected { message, .. } => ("rejected", message.clone()),
        TransitionOutcome::Failed { message } => ("failed", message.clone()),
    };
    if json {
        println!(
            "{}",
            serde_json::to_string(&serde_json::json!({ "outcome": kind, "message": message }))?
        );
    } else {
        println!("{kind}: {message}");
    }
    Ok(())
}

fn print_views(views: &[WidgetView], json: bool) -> Result<()> {
    if json {
        let rendered: Vec<_> = views
            .iter()
            .map(|view| {
                serde_json::json!({
                    "order_id": view.order_id.as_str(),
                    "scope": view.scope.as_str(),
                    "state": view.current_state,
                    "label": view.current_label,
                    "actions": view.actions(),
                    "selectable": view.selectable,
                    "feedback": view.feedback.as_ref().map(|f| f.text.as_str()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rendered)?);
        return Ok(());
    }

    for view in views {
        println!(
            "[{}] {:<8} {} ({})",
            view.order_id,
            view.scope.as_str(),
            view.current_label,
            view.current_state
        );
        for option in view.options.iter().filter(|o| !o.value.is_empty()) {
            println!("    - {:<18} {}", option.value, option.label);
        }
        if let Some(shown) = &view.feedback {
            let marker = match shown.kind {
                FeedbackKind::Info => "i",
                FeedbackKind::Success => "+",
                FeedbackKind::Error => "!",
            };
            println!("    {marker} {}", shown.text);
        }
    }
    Ok(())
}
