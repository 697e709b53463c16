use anyhow::{Context, Result};
use edge_xml::{parse_file, write_file};
use edgecfg::api::EdgeApi;
use edgecfg::export::export_document;
use edgecfg::report::render_export;
use edgecfg::schema::{schema_for, SchemaVersion};
use tracing::info;

use crate::cli::{ExportArgs, OutputFormat};
use crate::path_guard::prepare_output_dir;
use crate::session::{open_session, profile_for};

pub fn run_export(args: ExportArgs) -> Result<()> {
    let version = SchemaVersion::from(args.schema);
    let schema = schema_for(version);

    let doc = if let Some(path) = &args.from_file {
        info!(path = %path.display(), "reading configuration document from file");
        parse_file(path).with_context(|| format!("failed to parse {}", path.display()))?
    } else {
        let profile = profile_for(version, &args.connection)?;
        let client = open_session(&args.connection, profile)?;
        let edge = client
            .find_edge(&args.edge)
            .with_context(|| format!("failed to look up edge gateway '{}'", args.edge))?;
        info!(edge = %edge.name, id = %edge.id, "fetching configuration");
        client
            .fetch_config(&edge)
            .with_context(|| format!("failed to fetch configuration of '{}'", args.edge))?
    };

    if let Some(path) = &args.save_config {
        write_file(&doc, path)
            .with_context(|| format!("failed to save configuration to {}", path.display()))?;
    }

    prepare_output_dir(&args.output_dir)?;
    let (_, summary) = export_document(schema, &doc, &args.edge, &args.output_dir)
        .with_context(|| format!("failed to write records for '{}'", args.edge))?;

    match args.format {
        OutputFormat::Text => println!("{}", render_export(&summary)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    Ok(())
}
