use anyhow::{bail, Context, Result};
use edgecfg::api::dry_run::DirectoryTarget;
use edgecfg::api::EdgeApi;
use edgecfg::import::{ImportReport, Importer};
use edgecfg::model::Service;
use edgecfg::profile::{ApiProfile, SubmitMode};
use edgecfg::records::{read_export, LoadedRecords};
use edgecfg::report::render_import;
use edgecfg::schema::{schema_for, SchemaVersion};
use tracing::info;

use crate::cli::{ImportArgs, OutputFormat};
use crate::path_guard::prepare_output_dir;
use crate::session::{open_session, profile_for};

pub fn run_import(args: ImportArgs) -> Result<()> {
    let version = SchemaVersion::from(args.schema);
    let loaded = read_export(&args.input_dir, &args.source_edge, version).with_context(|| {
        format!(
            "failed to read records for '{}' from {}",
            args.source_edge,
            args.input_dir.display()
        )
    })?;
    if loaded.available.is_empty() {
        bail!(
            "no record files for '{}' in {}",
            args.source_edge,
            args.input_dir.display()
        );
    }

    let services: Vec<Service> = if args.only.is_empty() {
        Service::ALL.to_vec()
    } else {
        args.only.iter().copied().map(Service::from).collect()
    };

    let profile = profile_for(version, &args.connection)?;
    let report = if let Some(dir) = &args.dry_run {
        prepare_output_dir(dir)?;
        info!(dir = %dir.display(), "dry run: writing request bodies instead of submitting");
        let target = DirectoryTarget::new(dir);
        submit(&target, version, SubmitMode::SingleShot, &profile, &args, &loaded, &services)?
    } else {
        let client = open_session(&args.connection, profile.clone())?;
        submit(&client, version, profile.submit, &profile, &args, &loaded, &services)?
    };

    match args.format {
        OutputFormat::Text => println!("{}", render_import(&report)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if report.has_failures() {
        bail!("one or more services failed to import into '{}'", args.target_edge);
    }
    Ok(())
}

fn submit<A: EdgeApi>(
    api: &A,
    version: SchemaVersion,
    mode: SubmitMode,
    profile: &ApiProfile,
    args: &ImportArgs,
    loaded: &LoadedRecords,
    services: &[Service],
) -> Result<ImportReport> {
    let target = api
        .find_edge(&args.target_edge)
        .with_context(|| format!("failed to look up edge gateway '{}'", args.target_edge))?;

    let importer = Importer::new(api, schema_for(version), mode, profile.poll);
    importer
        .run(
            &args.source_edge,
            &target,
            &loaded.records,
            &loaded.available,
            services,
        )
        .with_context(|| format!("import into '{}' aborted", args.target_edge))
}
