use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};

use docstyler::config::{find_config_near, init_default_config, StyleConfig};
use docstyler::docx::package::DocxPackage;
use docstyler::docx::xml::{parse_xml_part, write_xml_part};
use docstyler::progress::{ConsoleProgress, ProgressSink};
use docstyler::session::DocumentSession;

#[derive(Parser, Debug)]
#[command(name = "docstyler")]
#[command(about = "DOCX paragraph classifier + reformatter (headings/captions/body)", long_about = None)]
struct Args {
    /// Generate a default config.json, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write config.json (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config.json when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input .docx (drag-and-drop supported)
    #[arg(value_name = "DOCX")]
    input: Option<PathBuf>,

    /// Output .docx (default: <input_stem>_排版.docx)
    #[arg(short, long, value_name = "DOCX")]
    output: Option<PathBuf>,

    /// Config file path (default: config.json next to the input)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override PagesToSkip from config (front-matter pages left untouched)
    #[arg(long, value_name = "N")]
    pages_to_skip: Option<u32>,

    /// Print per-role paragraph counts after formatting
    #[arg(long)]
    stats: bool,

    /// Only parse + re-serialize DOCX XML parts (no reformatting)
    #[arg(long)]
    roundtrip_only: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let progress = ConsoleProgress::new(true);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let input = match args.input {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  docstyler <input.docx>\n\nTIPS:\n  - You can drag a .docx file onto docstyler to reformat it.\n  - Default config search: config.json next to the input document.\n"
            );
            return Ok(());
        }
    };
    let output = match args.output {
        Some(p) => p,
        None => {
            let stem = input
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("output")
                .to_string();
            input.with_file_name(format!("{stem}_排版.docx"))
        }
    };

    if args.roundtrip_only {
        let mut pkg = DocxPackage::read(&input)?;
        for name in pkg.xml_part_names() {
            let Some(data) = pkg.part_bytes(&name) else {
                continue;
            };
            if data.is_empty() {
                continue;
            }
            let part =
                parse_xml_part(&name, data).with_context(|| format!("parse xml: {name}"))?;
            let bytes =
                write_xml_part(&part).with_context(|| format!("serialize xml: {name}"))?;
            pkg.replace_part(&name, bytes);
        }
        pkg.write_to(&output)?;
        return Ok(());
    }

    let mut cfg = match args.config.or_else(|| find_config_near(&input)) {
        Some(path) => {
            progress.log(&format!("using config: {}", path.display()));
            StyleConfig::load(&path)?
        }
        None => {
            progress.log("no config.json found, using built-in defaults");
            StyleConfig::default()
        }
    };
    if let Some(pages) = args.pages_to_skip {
        cfg.pages_to_skip = pages;
    }

    let mut session = DocumentSession::open(&input)?;
    session.apply_styles(&cfg, &progress)?;
    if args.stats {
        let stats = session.stats()?;
        for line in stats.lines() {
            progress.log(&line);
        }
        progress.log(&format!("total: {}", stats.total));
    }
    session.save_as(&output)?;
    progress.log(&format!("wrote: {}", output.display()));
    session.close();
    Ok(())
}
