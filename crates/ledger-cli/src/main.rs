use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger-cli")]
#[command(about = "CLI client for the ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:5000)
    #[arg(long, global = true, default_value = "http://127.0.0.1:5000")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Queue a transfer for the next block
    Submit {
        /// Current owner
        #[arg(long)]
        owner: String,
        /// New owner
        #[arg(long)]
        receiver: String,
        /// Amount paid
        #[arg(long)]
        amount: u64,
        /// Identifier of the asset changing hands
        #[arg(long)]
        asset_id: String,
    },
    /// Mine a block from the pending transactions
    Mine,
    /// Print the full chain
    Chain,
    /// Print transactions waiting for the next block
    Pending,
    /// Register one or more peers
    Register {
        /// Peer addresses, e.g. http://127.0.0.1:5001
        #[arg(required = true)]
        nodes: Vec<String>,
    },
    /// List known peers
    Peers,
    /// Adopt the longest valid chain among peers
    Resolve,
}

#[derive(Serialize)]
struct Tx {
    owner: String,
    receiver: String,
    amount: u64,
    asset_id: String,
}

#[derive(Serialize)]
struct Nodes {
    nodes: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .pretty()
        .init();

    let cli = Cli::parse();
    let node = cli.node.trim_end_matches('/').to_string();
    let client = reqwest::Client::new();

    let req = match cli.cmd {
        Command::Submit {
            owner,
            receiver,
            amount,
            asset_id,
        } => {
            let tx = Tx {
                owner,
                receiver,
                amount,
                asset_id,
            };
            client.post(format!("{node}/transactions/new")).json(&tx)
        }
        Command::Mine => client.get(format!("{node}/mine")),
        Command::Chain => client.get(format!("{node}/chain")),
        Command::Pending => client.get(format!("{node}/transactions/pending")),
        Command::Register { nodes } => client
            .post(format!("{node}/nodes/register"))
            .json(&Nodes { nodes }),
        Command::Peers => client.get(format!("{node}/nodes")),
        Command::Resolve => client.get(format!("{node}/nodes/resolve")),
    };

    debug!("sending {:?}", req);
    let res = req.send().await?;
    let status = res.status();
    let body = res.text().await?;
    println!("status: {}", status);
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
