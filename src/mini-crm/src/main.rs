//! Mini CRM — command-line front end for the CRM backend.
//!
//! Builds segment rules locally, previews and saves them, and drives
//! customers, orders and campaigns through the cached API client.

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use crm_cache::RequestCache;
use crm_client::CrmClient;
use crm_core::config::AppConfig;
use crm_core::types::{NewCampaign, NewCustomer, NewOrder};
use crm_segmentation::{deserialize, LogicalOperator, Rule, RuleGroup, RuleNode};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "mini-crm")]
#[command(about = "Segments, campaigns and insights for the Mini CRM backend")]
#[command(version)]
struct Cli {
    /// Optional config file layered under MINI_CRM__* environment variables
    #[arg(long, global = true)]
    config: Option<String>,

    /// Backend base URL (overrides config)
    #[arg(long, global = true, env = "MINI_CRM__API__BASE_URL")]
    base_url: Option<String>,

    /// Read cache TTL in milliseconds (overrides config)
    #[arg(long, global = true, env = "MINI_CRM__CACHE__TTL_MS")]
    cache_ttl_ms: Option<u64>,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Backend health and auth probe
    Health,
    /// Current session user
    Me,
    /// Customer records
    #[command(subcommand)]
    Customers(CustomerCommands),
    /// Orders
    #[command(subcommand)]
    Orders(OrderCommands),
    /// Audience segments
    #[command(subcommand)]
    Segments(SegmentCommands),
    /// Campaigns
    #[command(subcommand)]
    Campaigns(CampaignCommands),
    /// Ask the backend for message suggestions
    Suggest {
        #[arg(long, default_value = "bring back inactive users")]
        objective: String,
    },
    /// Dashboard totals
    Dashboard,
}

#[derive(Subcommand, Debug)]
enum CustomerCommands {
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand, Debug)]
enum OrderCommands {
    List {
        #[arg(long)]
        customer_id: Option<i64>,
    },
    Add {
        #[arg(long)]
        customer_id: i64,
        #[arg(long, default_value_t = 500.0)]
        amount: f64,
    },
}

#[derive(Subcommand, Debug)]
enum SegmentCommands {
    List,
    /// Audience size for the given rules
    Preview(RuleArgs),
    /// Save a named segment
    Create {
        #[arg(long, default_value = "High Spenders")]
        name: String,
        #[command(flatten)]
        rules: RuleArgs,
    },
    /// Audience size of a saved segment
    Size { id: i64 },
}

#[derive(Subcommand, Debug)]
enum CampaignCommands {
    List,
    Create {
        #[arg(long)]
        segment_id: i64,
        #[arg(long, default_value = "September Offer")]
        name: String,
        #[arg(long, default_value = "Hi {name}, here's 10% off on your next order!")]
        message: String,
        /// Send immediately after creating
        #[arg(long, default_value_t = false)]
        send: bool,
    },
    Send { id: i64 },
    Stats { id: i64 },
    Logs { id: i64 },
}

#[derive(Args, Debug)]
struct RuleArgs {
    /// Rule as "<field> <operator> <value>", e.g. "totalSpend > 10000" (repeatable)
    #[arg(long = "rule", value_parser = parse_rule)]
    rules: Vec<Rule>,

    /// Combine rules with OR instead of AND
    #[arg(long, default_value_t = false)]
    or: bool,

    /// Full rule tree as JSON; takes precedence over --rule
    #[arg(long, conflicts_with_all = ["rules", "or"])]
    rules_json: Option<String>,
}

fn parse_rule(raw: &str) -> Result<Rule, String> {
    raw.parse::<Rule>().map_err(|e| e.to_string())
}

impl RuleArgs {
    fn criteria(&self) -> anyhow::Result<RuleGroup> {
        if let Some(raw) = &self.rules_json {
            return match deserialize(raw)? {
                RuleNode::Group(group) => Ok(group),
                RuleNode::Rule(_) => bail!("--rules-json must describe a group at the root"),
            };
        }

        let op = if self.or {
            LogicalOperator::Or
        } else {
            LogicalOperator::And
        };
        let rules = if self.rules.is_empty() {
            vec!["totalSpend > 10000".parse::<Rule>()?]
        } else {
            self.rules.clone()
        };
        Ok(RuleGroup::new(op, rules.into_iter().map(RuleNode::from).collect()))
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mini_crm=info,crm_client=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = AppConfig::load_from(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(base_url) = cli.base_url {
        config.api.base_url = base_url;
    }
    if let Some(ttl) = cli.cache_ttl_ms {
        config.cache.ttl_ms = ttl;
    }

    info!(
        base_url = %config.api.base_url,
        cache_ttl_ms = config.cache.effective_ttl_ms(),
        "Configuration loaded"
    );

    let cache = Arc::new(RequestCache::from_config(&config.cache));
    let client = CrmClient::new(&config.api, cache).context("failed to build CRM client")?;

    match cli.command {
        Commands::Health => print_json(&client.health().await?)?,
        Commands::Me => print_json(&client.me().await?)?,
        Commands::Customers(cmd) => match cmd {
            CustomerCommands::List { search } => {
                print_json(&client.list_customers(search.as_deref()).await?)?
            }
            CustomerCommands::Add { name, email } => {
                let created = client.create_customer(&NewCustomer { name, email }).await?;
                print_json(&created)?
            }
        },
        Commands::Orders(cmd) => match cmd {
            OrderCommands::List { customer_id } => {
                print_json(&client.list_orders(customer_id).await?)?
            }
            OrderCommands::Add {
                customer_id,
                amount,
            } => {
                let created = client
                    .create_order(&NewOrder {
                        customer_id,
                        amount,
                    })
                    .await?;
                print_json(&created)?
            }
        },
        Commands::Segments(cmd) => match cmd {
            SegmentCommands::List => print_json(&client.list_segments().await?)?,
            SegmentCommands::Preview(rules) => {
                let criteria = rules.criteria()?;
                info!(criteria = %criteria, "Previewing audience");
                print_json(&client.preview_segment(&criteria).await?)?
            }
            SegmentCommands::Create { name, rules } => {
                let criteria = rules.criteria()?;
                info!(name = %name, criteria = %criteria, "Saving segment");
                print_json(&client.create_segment(&name, &criteria).await?)?
            }
            SegmentCommands::Size { id } => print_json(&client.segment_size(id).await?)?,
        },
        Commands::Campaigns(cmd) => match cmd {
            CampaignCommands::List => print_json(&client.list_campaigns().await?)?,
            CampaignCommands::Create {
                segment_id,
                name,
                message,
                send,
            } => {
                let campaign = client
                    .create_campaign(&NewCampaign {
                        segment_id,
                        name,
                        message,
                    })
                    .await?;
                print_json(&campaign)?;
                if send {
                    print_json(&client.send_campaign(campaign.id).await?)?;
                }
            }
            CampaignCommands::Send { id } => print_json(&client.send_campaign(id).await?)?,
            CampaignCommands::Stats { id } => print_json(&client.campaign_stats(id).await?)?,
            CampaignCommands::Logs { id } => print_json(&client.campaign_logs(id).await?)?,
        },
        Commands::Suggest { objective } => {
            print_json(&client.suggest_messages(&objective).await?)?
        }
        Commands::Dashboard => print_json(&client.dashboard_stats().await?)?,
    }

    Ok(())
}
