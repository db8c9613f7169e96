use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use nrbf_codec::{ClassLayout, Node, ParseOptions, Record, Session};
use nrbf_graph::{read_records, Preamble};
use serde::Serialize;
use svip_model::project::TrackKind;
use svip_model::{ProjectSummary, SvipConfig};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Inspect(args) => cmd_inspect(&args, cli.format),
        Command::Info(args) => cmd_info(&args, cli.format),
        Command::Convert(args) => cmd_convert(&args).map(|label| {
            println!(
                "{} Converted {} → {} ({})",
                "✓".green().bold(),
                args.input.display(),
                args.output.display().to_string().bold(),
                label.cyan()
            );
        }),
    }
}

#[derive(Serialize)]
struct StreamDump<'a> {
    preamble: &'a Preamble,
    records: &'a [Node],
}

fn cmd_inspect(args: &InspectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let bytes = read_bytes(&args.path)?;
    let (preamble, records, session) = read_records(&bytes, &ParseOptions::default())?;
    match format {
        OutputFormat::Json => {
            let dump = StreamDump {
                preamble: &preamble,
                records: &records,
            };
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
        OutputFormat::Text => {
            println!(
                "{}  {} records, {} classes, {} libraries",
                preamble.label().bold(),
                records.len(),
                session.class_count(),
                session.libraries().count()
            );
            for (index, record) in records.iter().enumerate() {
                let id = record
                    .object_id()
                    .map(|id| format!("#{id}"))
                    .unwrap_or_default();
                println!(
                    "{:>5}  {:>2} {:<32} {:>6}  {}",
                    index.to_string().dimmed(),
                    record.record_type().as_byte(),
                    record.record_type().name().yellow(),
                    id.cyan(),
                    describe(record, &session)
                );
            }
        }
    }
    Ok(())
}

fn describe(record: &Record, session: &Session) -> String {
    match record {
        Record::Header(h) => format!("root #{} v{}.{}", h.root_id, h.major_version, h.minor_version),
        Record::Class(class) => {
            let library = class
                .definition
                .library_id
                .and_then(|id| session.library(id))
                .map(|name| format!(" [{}]", name.split(',').next().unwrap_or(name)))
                .unwrap_or_default();
            let layout = match class.layout {
                ClassLayout::Inline => String::new(),
                ClassLayout::Reuse { metadata_id } => format!(" (metadata #{metadata_id})"),
            };
            format!(
                "{}{library}{layout}, {} members",
                class.name(),
                class.members.len()
            )
        }
        Record::String(s) => format!("{:?}", s.value),
        Record::Library(lib) => format!("library #{} {}", lib.library_id, lib.name),
        Record::Reference(r) => format!("→ #{}", r.id_ref),
        Record::MemberPrimitive { value } => format!("{value:?}"),
        Record::BinaryArray(a) => format!("{} {:?} of {:?}", a.array_type, a.lengths, a.element_type),
        Record::ArraySinglePrimitive(a) => format!("{} × {}", a.values.len(), a.element),
        Record::ArraySingleObject(a) | Record::ArraySingleString(a) => format!("{} slots", a.length),
        Record::MethodCall(m) => format!("{}::{}", m.type_name, m.method_name),
        Record::MethodReturn(m) => format!("flags {:?}", m.flags),
        Record::MessageEnd => String::new(),
        Record::ObjectNull | Record::NullMultiple256 { .. } | Record::NullMultiple { .. } => {
            format!("{} null", record.null_count().unwrap_or(0))
        }
    }
}

fn cmd_info(args: &InfoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (label, root) = svip_model::read_file(&args.path)
        .with_context(|| format!("reading {}", args.path.display()))?;
    let summary = ProjectSummary::of(&label, &root)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Text => print_summary(&summary),
    }
    Ok(())
}

fn print_summary(summary: &ProjectSummary) {
    println!("Version: {}", summary.version.bold());
    println!("Tempos:");
    for tempo in &summary.tempos {
        println!("  {:>8}  {} bpm", tempo.pos, tempo.bpm.to_string().cyan());
    }
    println!("Beats:");
    for beat in &summary.beats {
        println!(
            "  bar {:>4}  {}/{}",
            beat.bar_index, beat.numerator, beat.denominator
        );
    }
    println!("Tracks:");
    for track in &summary.tracks {
        let kind = match track.kind {
            TrackKind::Singing => "singing".green(),
            TrackKind::Instrument => "instrument".blue(),
        };
        let flags = match (track.mute, track.solo) {
            (true, true) => " muted, solo",
            (true, false) => " muted",
            (false, true) => " solo",
            (false, false) => "",
        };
        println!(
            "  {:<10} {}  {} notes, volume {:.2}{}",
            kind,
            track.name.bold(),
            track.notes,
            track.volume,
            flags.dimmed()
        );
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SvipConfig> {
    let Some(path) = path else {
        return Ok(SvipConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
    debug!(?config, "loaded config");
    Ok(config)
}

/// Re-encode `args.input` into `args.output`. Returns the label written.
fn cmd_convert(args: &ConvertArgs) -> anyhow::Result<String> {
    let config = load_config(args.config.as_deref())?;
    let version = args.version.unwrap_or(config.version);
    let (label, root) = svip_model::read_file_with(&args.input, &config.parse)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let output = version.resolve(&label);
    debug!(input = %label, %output, %version, "converting");
    svip_model::write_file(&args.output, &root, &output)
        .with_context(|| format!("writing {}", args.output.display()))?;
    Ok(output)
}

fn read_bytes(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}
