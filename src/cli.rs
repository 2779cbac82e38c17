use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "dispatchbot")]
#[command(author, version, about = "Credit-metered bulk-dispatch Telegram bot", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot in long-polling mode
    Run,

    /// Mint voucher keys directly against the local database
    GenerateVouchers {
        /// Credit value of each voucher
        #[arg(short, long)]
        value: i64,

        /// Number of vouchers to mint
        #[arg(short, long, default_value_t = 1)]
        count: i64,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
