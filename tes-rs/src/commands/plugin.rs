//! Plugin command implementations

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use std::fs;
use std::path::{Path, PathBuf};
use tes_plugin::builder::DEFAULT_PATCH_NAME;
use tes_plugin::{
    CancellationToken, ContainerKind, DecodeLimits, DirectorySource, EncodeOptions, LoadOrder,
    MergeConfig, MergeReport, PatchOptions, Plugin, PluginName, Strategy, TagMode, build_patch,
    merge_from_source, write_patch,
};

use crate::utils::{create_spinner, format_bytes, format_form_id, format_header_flags};
use prettytable::{Cell, Row, Table, format::consts::FORMAT_NO_LINESEP_WITH_TITLE};

#[derive(Subcommand)]
pub enum PluginCommands {
    /// Show information about a plugin
    Info {
        /// Path to the plugin
        file: String,

        /// List every record
        #[arg(short, long)]
        records: bool,
    },

    /// Check that a plugin decodes and encodes back to the same content
    Verify {
        /// Path to the plugin
        file: String,
    },

    /// List records that more than one active plugin defines
    Conflicts {
        /// Directory holding the plugins
        #[arg(short, long)]
        data: String,

        /// plugins.txt listing the active plugins in load order
        #[arg(short, long)]
        load_order: String,

        /// Merge configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Honor bash tags in plugin descriptions
        #[arg(long)]
        tags: bool,

        /// Also list records with a single contributor
        #[arg(long)]
        all: bool,
    },

    /// Build a bashed patch from the active plugins
    Patch {
        /// Directory holding the plugins
        #[arg(short, long)]
        data: String,

        /// plugins.txt listing the active plugins in load order
        #[arg(short, long)]
        load_order: String,

        /// Output file (default: "<data>/Bashed Patch, 0.esp")
        #[arg(short, long)]
        output: Option<String>,

        /// Merge configuration (YAML or JSON)
        #[arg(short, long)]
        config: Option<String>,

        /// Honor bash tags in plugin descriptions
        #[arg(long)]
        tags: bool,

        /// Write a light plugin
        #[arg(long)]
        light: bool,

        /// Leave out records the patch does not change
        #[arg(long)]
        skip_redundant: bool,

        /// Author stored in the patch header
        #[arg(long)]
        author: Option<String>,
    },
}

pub fn execute(command: PluginCommands) -> Result<()> {
    match command {
        PluginCommands::Info { file, records } => show_info(&file, records),
        PluginCommands::Verify { file } => verify_plugin(&file),
        PluginCommands::Conflicts {
            data,
            load_order,
            config,
            tags,
            all,
        } => list_conflicts(&data, &load_order, config.as_deref(), tags, all),
        PluginCommands::Patch {
            data,
            load_order,
            output,
            config,
            tags,
            light,
            skip_redundant,
            author,
        } => build_bashed_patch(PatchParams {
            data_dir: &data,
            load_order_path: &load_order,
            output,
            config_path: config.as_deref(),
            tags,
            light,
            skip_redundant,
            author,
        }),
    }
}

fn read_plugin(path: &str) -> Result<(Plugin, Vec<u8>)> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {path}"))?;
    let name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path);
    let plugin = Plugin::decode(PluginName::new(name), &bytes, &DecodeLimits::default())
        .context("Failed to decode plugin")?;
    Ok((plugin, bytes))
}

fn load_config(path: Option<&str>, tags: bool) -> Result<MergeConfig> {
    let mut config = match path {
        None => MergeConfig::new(),
        Some(path) => {
            let text =
                fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
            let extension = Path::new(path)
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            match extension.as_deref() {
                Some("json") => serde_json::from_str(&text).context("Invalid JSON configuration")?,
                Some("yaml" | "yml") => {
                    serde_yaml_ng::from_str(&text).context("Invalid YAML configuration")?
                }
                _ => bail!("Configuration must be a .json, .yaml or .yml file: {path}"),
            }
        }
    };
    if tags {
        config.tags = TagMode::Honor;
    }
    config.validate().context("Invalid merge configuration")?;
    Ok(config)
}

fn read_load_order(path: &str) -> Result<LoadOrder> {
    let order = LoadOrder::read_plugins_txt(path)
        .with_context(|| format!("Failed to read load order {path}"))?;
    if order.is_empty() {
        bail!("Load order {path} lists no active plugins");
    }
    Ok(order)
}

fn show_info(path: &str, list_records: bool) -> Result<()> {
    let (plugin, bytes) = read_plugin(path)?;
    let header = &plugin.header;

    println!("Plugin Information");
    println!("==================");
    println!("Name: {}", plugin.name);
    println!("File size: {}", format_bytes(bytes.len() as u64));
    println!("Flags: {}", format_header_flags(header.flags));
    println!("Version: {:.2}", header.version);
    println!("Records and groups: {}", plugin.count_records());
    println!("Next object id: {:06X}", header.next_object_id);
    if let Some(author) = &header.author {
        println!("Author: {author}");
    }
    if let Some(description) = &header.description {
        println!("Description: {description}");
    }
    if !plugin.is_light() {
        let eligible = if plugin.light_eligible() { "yes" } else { "no" };
        println!("Light eligible: {eligible}");
    }

    println!("\nMasters ({}):", header.masters.len());
    for (index, master) in header.masters.iter().enumerate() {
        println!("  [{index:02X}] {}", master.name);
    }

    let groups = plugin
        .groups
        .iter()
        .map(|group| [group.label().to_string(), group.records().count().to_string()]);
    println!();
    table(["Group", "Records"], groups).printstd();

    if list_records {
        let records = plugin.records().map(|record| {
            [
                format_form_id(record.form_id()),
                record.signature().to_string(),
                record.editor_id().unwrap_or_default(),
                format!("{:08X}", record.flags().bits()),
            ]
        });
        println!();
        table(["Form ID", "Type", "Editor ID", "Flags"], records).printstd();
    }

    Ok(())
}

fn verify_plugin(path: &str) -> Result<()> {
    let (plugin, bytes) = read_plugin(path)?;

    let encoded = plugin
        .encode(&EncodeOptions::default())
        .context("Failed to encode plugin")?;
    let again = Plugin::decode(plugin.name.clone(), &encoded, &DecodeLimits::default())
        .context("Re-encoded plugin does not decode")?;
    if again != plugin {
        bail!("Re-encoded plugin differs from the original");
    }
    let compressed = plugin.records().any(|r| r.header().is_compressed());
    if !compressed && encoded != bytes {
        let offset = encoded
            .iter()
            .zip(&bytes)
            .position(|(a, b)| a != b)
            .unwrap_or(encoded.len().min(bytes.len()));
        bail!("Re-encoded plugin differs from the original at byte offset {offset:#x}");
    }

    let count = plugin.count_records();
    if plugin.header.record_count as usize != count {
        log::warn!(
            "Header declares {} records and groups, file holds {count}",
            plugin.header.record_count
        );
    }

    if encoded == bytes {
        println!("✓ Plugin verification passed (byte-identical, {count} records and groups)");
    } else {
        println!("✓ Plugin verification passed (content-identical, {count} records and groups)");
    }
    Ok(())
}

fn print_rejections(report: &MergeReport) {
    if !report.rejected.is_empty() {
        println!("\nSkipped plugins:");
        for rejected in &report.rejected {
            println!(
                "  {} ({} records): {}",
                rejected.plugin, rejected.skipped_records, rejected.error
            );
        }
    }
    if !report.issues.is_empty() {
        println!("\nSkipped records:");
        for issue in &report.issues {
            println!("  {issue}");
        }
    }
}

fn list_conflicts(
    data_dir: &str,
    load_order_path: &str,
    config_path: Option<&str>,
    tags: bool,
    all: bool,
) -> Result<()> {
    let config = load_config(config_path, tags)?;
    let order = read_load_order(load_order_path)?;
    let source = DirectorySource::new(data_dir);

    let spinner = create_spinner("Reading plugins...");
    let outcome = merge_from_source(
        &order,
        &source,
        &config,
        &DecodeLimits::default(),
        &CancellationToken::new(),
    )?;
    spinner.finish_and_clear();

    let rows: Vec<_> = outcome
        .records
        .iter()
        .filter(|merged| all || merged.contributors.len() >= 2)
        .map(|merged| {
            let strategy = match merged.strategy {
                Strategy::ConflictFree => "single",
                Strategy::Override => "override",
                Strategy::Selective => "merged",
            };
            [
                merged.record.id.to_string(),
                merged.record.signature.to_string(),
                merged.record.editor_id().unwrap_or_default(),
                strategy.to_string(),
                merged.winner.to_string(),
                merged
                    .contributors
                    .iter()
                    .map(PluginName::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ]
        })
        .collect();

    if rows.is_empty() {
        println!("No conflicts found");
    } else {
        let titles = ["Record", "Type", "Editor ID", "Strategy", "Winner", "Contributors"];
        table(titles, rows).printstd();
    }

    let report = &outcome.report;
    println!(
        "\n{} records: {} single, {} overridden, {} merged, {} deleted",
        report.resolved(),
        report.conflict_free,
        report.overridden,
        report.merged,
        report.deleted.len()
    );
    print_rejections(report);
    Ok(())
}

/// Parameters for the patch build
struct PatchParams<'a> {
    data_dir: &'a str,
    load_order_path: &'a str,
    output: Option<String>,
    config_path: Option<&'a str>,
    tags: bool,
    light: bool,
    skip_redundant: bool,
    author: Option<String>,
}

fn build_bashed_patch(params: PatchParams<'_>) -> Result<()> {
    let config = load_config(params.config_path, params.tags)?;
    let order = read_load_order(params.load_order_path)?;
    let output = params
        .output
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new(params.data_dir).join(DEFAULT_PATCH_NAME));
    let name = output
        .file_name()
        .and_then(|n| n.to_str())
        .context("Output path has no file name")?;

    let mut options = PatchOptions::new()
        .name(name)
        .skip_redundant(params.skip_redundant)
        .description("Bashed patch built by tes-rs");
    if params.light {
        options = options.kind(ContainerKind::Light);
    }
    if let Some(author) = params.author {
        options = options.author(author);
    }

    let spinner = create_spinner("Building patch...");
    let outcome = build_patch(
        &order,
        &DirectorySource::new(params.data_dir),
        &config,
        &options,
    )
    .context("Failed to build patch")?;
    spinner.set_message("Writing patch...");
    write_patch(&outcome.patch, &output, &options.encode)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    spinner.finish_and_clear();

    let build = &outcome.build;
    println!("Wrote {}", output.display());
    println!("  Records: {}", build.records_written);
    println!(
        "  Masters: {}",
        build
            .masters
            .iter()
            .map(PluginName::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  Merged: {}, overridden: {}, single: {}",
        outcome.merge.merged, outcome.merge.overridden, outcome.merge.conflict_free
    );
    let skipped = build.skipped_opaque + build.skipped_localized + build.skipped_redundant;
    if skipped > 0 {
        println!(
            "  Left to the winning plugin: {} opaque, {} localized, {} unchanged",
            build.skipped_opaque, build.skipped_localized, build.skipped_redundant
        );
    }
    for (id, error) in &build.failed {
        println!("  Not written: {id}: {error}");
    }
    print_rejections(&outcome.merge);
    Ok(())
}

/// Bold titles and one row per item, every row as wide as the titles
fn table<const N: usize>(titles: [&str; N], rows: impl IntoIterator<Item = [String; N]>) -> Table {
    let mut table = Table::new();
    table.set_format(*FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(Row::new(
        titles.iter().map(|title| Cell::new(title).style_spec("b")).collect(),
    ));
    for row in rows {
        table.add_row(Row::new(row.iter().map(|text| Cell::new(text)).collect()));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rows() {
        let rows = [
            ["MISC".to_string(), "2".to_string()],
            ["GLOB".to_string(), "1".to_string()],
        ];
        let table = table(["Group", "Records"], rows);
        assert_eq!(table.len(), 2);
        let cell = |row: usize, column: usize| {
            table.get_row(row).and_then(|r| r.get_cell(column)).map(Cell::get_content)
        };
        assert_eq!(cell(1, 0).as_deref(), Some("GLOB"));
        assert_eq!(cell(0, 1).as_deref(), Some("2"));
        assert!(table.to_string().contains("Records"));
    }
}
