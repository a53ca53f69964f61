//! CLI Application logic
//!
//! Contains the command-line interface implementation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use pubtree_ast::Document;
use pubtree_icml::{
    endnotes_path, export, import, ConvertOptions, Diagnostics, IcmlDocument, IdmlArchive, SourceSet,
    StyleRegistry, Stylesheet,
};

/// Output format for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output for tool consumption
    Json,
}

#[derive(Parser)]
#[command(name = "pubtree")]
#[command(author, version, about = "ICML/IDML interchange for canonical documents", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Diagnostics format (text or json)
    #[arg(long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by import and export
#[derive(Args, Debug, Default, Clone)]
pub struct ConvertArgs {
    /// Sibling publication file searched for cross-document references
    #[arg(long = "source")]
    pub sources: Vec<PathBuf>,

    /// Auxiliary document searched before sources
    #[arg(long = "document")]
    pub documents: Vec<PathBuf>,

    /// TOML file with conversion options
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Keep paragraphs that end up empty
    #[arg(long)]
    pub preserve_paragraphs: bool,

    /// Turn bulleted and numbered paragraphs into lists
    #[arg(long)]
    pub convert_lists: bool,

    /// Preview mode: unwrap endnote carriers
    #[arg(long)]
    pub strip_notes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an ICML story or IDML package to canonical XML
    Import {
        /// Input .icml or .idml file
        input: PathBuf,

        /// Output XML file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        args: ConvertArgs,
    },

    /// Convert canonical XML to an ICML story
    Export {
        /// Input canonical XML file
        input: PathBuf,

        /// Output ICML file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        args: ConvertArgs,
    },

    /// Render the styles of an ICML or IDML file as CSS
    Stylesheet {
        /// Input .icml or .idml file
        input: PathBuf,

        /// Output CSS file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// TOML file with conversion options
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Run the CLI application
///
/// This is the main entry point for the command-line interface.
/// It parses arguments and dispatches to the appropriate command.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Import { input, output, args } => {
            let options = load_options(&input, &args)?;
            import_command(&input, output.as_deref(), &options, cli.format)?;
        }
        Commands::Export { input, output, args } => {
            let options = load_options(&input, &args)?;
            export_command(&input, output.as_deref(), &options, cli.format)?;
        }
        Commands::Stylesheet { input, output, config } => {
            let args = ConvertArgs {
                config,
                ..ConvertArgs::default()
            };
            let options = load_options(&input, &args)?;
            stylesheet_command(&input, output.as_deref(), &options)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Conversion options from the config file, the input name and the flags
pub fn load_options(input: &Path, args: &ConvertArgs) -> Result<ConvertOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            ConvertOptions::from_toml_str(&text)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        }
        None => ConvertOptions::default(),
    };
    options = options.with_document_path(input);
    options.sources.extend(args.sources.iter().cloned());
    options.documents.extend(args.documents.iter().cloned());
    options.preserve_paragraphs |= args.preserve_paragraphs;
    options.convert_lists |= args.convert_lists;
    options.strip_notes |= args.strip_notes;
    Ok(options)
}

fn is_idml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("idml"))
}

/// Read an `.icml` file, or flatten an `.idml` package into one tree
fn read_interchange(input: &Path) -> Result<IcmlDocument> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    if is_idml(input) {
        let archive = IdmlArchive::open(input)
            .with_context(|| format!("Failed to open IDML package: {}", input.display()))?;
        let root = archive
            .to_document()
            .with_context(|| format!("Failed to read IDML package: {}", input.display()))?;
        return Ok(IcmlDocument::new(root));
    }
    let xml = fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;
    IcmlDocument::parse(&xml).with_context(|| format!("Failed to parse ICML: {}", input.display()))
}

fn output_path(explicit: Option<&Path>, options: &ConvertOptions, input: &Path, extension: &str) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| options.output.clone())
        .unwrap_or_else(|| input.with_extension(extension))
}

fn report(diagnostics: &Diagnostics, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for diagnostic in diagnostics.iter() {
                eprintln!("  {}", diagnostic);
            }
        }
        OutputFormat::Json => {
            let items: Vec<_> = diagnostics.iter().collect();
            let json = serde_json::to_string_pretty(&items).context("Failed to serialize diagnostics")?;
            println!("{}", json);
        }
    }
    Ok(())
}

/// Execute the import command; returns the path written
pub fn import_command(
    input: &Path,
    output: Option<&Path>,
    options: &ConvertOptions,
    format: OutputFormat,
) -> Result<PathBuf> {
    if format == OutputFormat::Text {
        println!("pubtree v{}", pubtree_icml::VERSION);
        println!("Importing: {}", input.display());
    }

    let source = read_interchange(input)?;
    let sources = SourceSet::load(options).context("Failed to read source documents")?;
    let result = import(&source, &sources, options);

    let output_path = output_path(output, options, input, "xml");
    fs::write(&output_path, result.output.to_xml())
        .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;

    if format == OutputFormat::Text {
        println!("  Created: {}", output_path.display());
    }
    report(&result.diagnostics, format)?;
    Ok(output_path)
}

/// Execute the export command; returns the paths written
pub fn export_command(
    input: &Path,
    output: Option<&Path>,
    options: &ConvertOptions,
    format: OutputFormat,
) -> Result<Vec<PathBuf>> {
    if format == OutputFormat::Text {
        println!("pubtree v{}", pubtree_icml::VERSION);
        println!("Exporting: {}", input.display());
    }
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    let xml = fs::read_to_string(input)
        .with_context(|| format!("Failed to read input file: {}", input.display()))?;
    let doc = Document::parse(&xml)
        .with_context(|| format!("Failed to parse canonical XML: {}", input.display()))?;
    let sources = SourceSet::load(options).context("Failed to read source documents")?;
    let result = export(&doc, &sources, options);

    let output_path = output_path(output, options, input, "icml");
    fs::write(&output_path, result.output.document.to_xml())
        .with_context(|| format!("Failed to write output file: {}", output_path.display()))?;
    let mut written = vec![output_path.clone()];

    if let Some(endnotes) = &result.output.endnotes {
        let path = endnotes_path(&output_path);
        fs::write(&path, endnotes.to_xml())
            .with_context(|| format!("Failed to write endnotes file: {}", path.display()))?;
        written.push(path);
    }

    if format == OutputFormat::Text {
        for path in &written {
            println!("  Created: {}", path.display());
        }
    }
    report(&result.diagnostics, format)?;
    Ok(written)
}

/// Execute the stylesheet command; returns the rendered CSS
pub fn stylesheet_command(input: &Path, output: Option<&Path>, options: &ConvertOptions) -> Result<String> {
    let mut diagnostics = Diagnostics::new();
    let registry = if is_idml(input) {
        let archive = IdmlArchive::open(input)
            .with_context(|| format!("Failed to open IDML package: {}", input.display()))?;
        archive
            .style_registry(&mut diagnostics)
            .with_context(|| format!("Failed to read styles: {}", input.display()))?
    } else {
        let source = read_interchange(input)?;
        StyleRegistry::from_root(&source.root, &mut diagnostics)
    };

    let css = Stylesheet::from_registry(&registry, options.em_baseline(), &mut diagnostics).render();
    match output {
        Some(path) => fs::write(path, &css)
            .with_context(|| format!("Failed to write stylesheet: {}", path.display()))?,
        None => print!("{}", css),
    }
    report(&diagnostics, OutputFormat::Text)?;
    Ok(css)
}
