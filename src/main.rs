use std::time::Duration;

use clap::{Parser, Subcommand};

use redmodel::schema::{ID_FIELD, KEY_DELIMITER};
use redmodel::{Cmd, Pool, PoolConfig, RespValue};

#[derive(Parser)]
#[command(name = "redmodel")]
#[command(about = "Inspect collections stored by redmodel")]
struct Args {
    /// Store address; defaults to $REDMODEL_ADDR or 127.0.0.1:6379
    #[arg(short, long)]
    addr: Option<String>,

    /// Round-trip timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the store answers
    Ping,
    /// Number of records in an indexed collection
    Count { collection: String },
    /// Ids of an indexed collection
    Ids {
        collection: String,
        #[arg(long, default_value_t = 0)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Stored fields of one record
    Show { collection: String, id: String },
}

fn key(collection: &str, suffix: &str) -> String {
    format!("{}{}{}", collection, KEY_DELIMITER, suffix)
}

async fn run_one(pool: &Pool, cmd: Cmd) -> anyhow::Result<RespValue> {
    let mut conn = pool.get().await?;
    let mut replies = conn.pipeline(&[cmd]).await?;
    let reply = replies
        .pop()
        .ok_or_else(|| anyhow::anyhow!("store sent no reply"))?;
    Ok(reply.into_result()?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = PoolConfig::from_env()
        .max_active(1)
        .io_timeout(Some(Duration::from_millis(args.timeout_ms)));
    if let Some(addr) = args.addr {
        config = config.address(addr);
    }
    tracing::info!("Connecting to {}", config.address);
    let pool = Pool::new(config);

    match args.command {
        Command::Ping => {
            let reply = run_one(&pool, Cmd::new("PING")).await?;
            println!("{}", reply.into_string()?.unwrap_or_default());
        }
        Command::Count { collection } => {
            let n = run_one(&pool, Cmd::new("SCARD").arg(key(&collection, "all")))
                .await?
                .into_integer()?;
            println!("{}", n);
        }
        Command::Ids {
            collection,
            limit,
            offset,
        } => {
            let mut cmd = Cmd::new("SORT")
                .arg(key(&collection, "all"))
                .arg("BY")
                .arg("nosort");
            if limit > 0 || offset > 0 {
                let count: i64 = if limit > 0 { limit as i64 } else { -1 };
                cmd = cmd.arg("LIMIT").arg(offset).arg(count);
            }
            for id in run_one(&pool, cmd).await?.into_array()? {
                if let Some(id) = id.into_string()? {
                    println!("{}", id);
                }
            }
        }
        Command::Show { collection, id } => {
            let pairs = run_one(&pool, Cmd::new("HGETALL").arg(key(&collection, &id)))
                .await?
                .into_array()?;
            if pairs.is_empty() {
                anyhow::bail!("no record {} in {}", id, collection);
            }
            let mut items = pairs.into_iter();
            while let (Some(field), Some(value)) = (items.next(), items.next()) {
                let field = field.into_string()?.unwrap_or_default();
                if field == ID_FIELD {
                    continue;
                }
                let value = value.into_bulk()?.unwrap_or_default();
                println!("{} = {}", field, String::from_utf8_lossy(&value));
            }
        }
    }

    Ok(())
}
