use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run one ingestion batch for a (source, table) pair
    Run {
        #[arg(long, help = "JSON file holding an array of source records")]
        input: String,

        #[arg(long, help = "Source system name recorded in staging and state")]
        source: String,

        #[arg(long, help = "Source table to ingest")]
        table: String,

        #[arg(
            long,
            help = "Park the batch in quarantine on a WARN reconciliation instead of advancing"
        )]
        hold_on_warn: bool,

        #[arg(long, help = "State directory (defaults to ~/.tidemark/state)")]
        state_dir: Option<String>,

        #[arg(long, help = "Staging directory (defaults to ~/.tidemark/staging)")]
        staging_dir: Option<String>,

        #[arg(long, help = "Print the outcome as JSON instead of a table")]
        json: bool,
    },
    /// Show the watermark control row for a (source, table) pair
    Watermark {
        #[arg(long, help = "Source system name")]
        source: String,

        #[arg(long, help = "Table name")]
        table: String,

        #[arg(long, help = "State directory (defaults to ~/.tidemark/state)")]
        state_dir: Option<String>,

        #[arg(long, help = "Print the watermark as JSON instead of a table")]
        json: bool,
    },
    /// List the audit trail for a (source, table) pair
    Audit {
        #[arg(long, help = "Source system name")]
        source: String,

        #[arg(long, help = "Table name")]
        table: String,

        #[arg(long, help = "Only show the most recent N entries")]
        last: Option<usize>,

        #[arg(long, help = "State directory (defaults to ~/.tidemark/state)")]
        state_dir: Option<String>,

        #[arg(long, help = "Print the entries as JSON instead of a table")]
        json: bool,
    },
}
