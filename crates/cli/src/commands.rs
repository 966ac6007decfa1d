use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Split a sequence collection into bounded batches and write the
    /// manifest
    Split {
        /// Input files or URLs; all inputs are read as one logical
        /// collection. Suffixes .gz, .tar, .tar.gz and .tgz are unpacked
        /// transparently.
        #[arg(required = true)]
        query: Vec<String>,

        #[arg(long, help = "Results location (local path, s3:// or gs://)")]
        results: String,

        #[arg(
            long,
            help = "Hard per-batch ceiling in residues",
            conflicts_with = "num_parts"
        )]
        batch_len: Option<u64>,

        #[arg(
            long,
            help = "Target batch count; reads the input twice to measure it first"
        )]
        num_parts: Option<u32>,
    },
    /// Render one job per manifest entry and apply them to the scheduler
    Submit {
        #[arg(long, help = "Results location holding the manifest")]
        results: String,

        #[arg(long, help = "Job descriptor template")]
        template: String,

        #[arg(long, default_value = "seqferry", help = "Cluster name for log messages")]
        cluster_name: String,

        #[arg(long, default_value_t = 1, help = "Worker pool size applied after submission")]
        num_nodes: u32,

        #[arg(long, help = "Scalable pool object, e.g. deployment/seqferry-workers")]
        worker_pool: Option<String>,

        #[arg(long, default_value_t = model::config::DFLT_GROUP_SIZE, help = "Descriptors per bulk apply")]
        group_size: usize,

        #[arg(long, help = "Extra template variables: var1=value1,var2=value2")]
        subs: Option<String>,

        #[arg(long, help = "kubectl context")]
        kube_context: Option<String>,

        #[arg(long, help = "kubectl namespace")]
        namespace: Option<String>,
    },
    /// Report the current run phase
    Status {
        #[arg(long, help = "Results location")]
        results: String,

        #[arg(long, help = "Print the snapshot as JSON instead of text")]
        json: bool,

        #[arg(long, help = "kubectl context")]
        kube_context: Option<String>,

        #[arg(long, help = "kubectl namespace")]
        namespace: Option<String>,
    },
    /// Reconcile the run: finalize and tear down once it is terminal
    Janitor {
        #[arg(long, help = "Results location")]
        results: String,

        #[arg(long, help = "kubectl context")]
        kube_context: Option<String>,

        #[arg(long, help = "kubectl namespace")]
        namespace: Option<String>,
    },
    /// Delete the run's cluster resources unconditionally
    Delete {
        #[arg(long, help = "Results location")]
        results: String,

        #[arg(long, help = "Also remove the sealed batches from the results location")]
        remove_batches: bool,

        #[arg(long, help = "kubectl context")]
        kube_context: Option<String>,

        #[arg(long, help = "kubectl namespace")]
        namespace: Option<String>,
    },
}
