//! Command handlers.
//!
//! Each handler opens the services it needs over one connection and prints
//! a plain-text result to stdout.

use crate::args::{ArtifactCommand, CodeCommand, Command, MainCodeFields};
use anyhow::{anyhow, bail, Context as _, Result};
use kazi_core::{
    ArtifactDraft, ArtifactListQuery, ArtifactOrdering, ArtifactService, ExportFormat, FormType,
    MainCode, MainCodeDraft, MainCodeListQuery, MainCodeOrdering, MainCodeService,
    SqliteArtifactRepository, SqliteMainCodeRepository,
};
use rusqlite::Connection;
use serde_json::Value;
use std::io::Write as _;
use std::path::Path;

pub fn dispatch(conn: &mut Connection, command: Command) -> Result<()> {
    match command {
        Command::Code(command) => run_code(conn, command),
        Command::Artifact(command) => run_artifact(conn, command),
        other => dispatch_without_db(other),
    }
}

/// Runs the commands that never touch the catalog.
pub fn dispatch_without_db(command: Command) -> Result<()> {
    match command {
        Command::Ping => println!("kazi_core ping={}", kazi_core::ping()),
        Command::Version => println!("kazi_core version={}", kazi_core::core_version()),
        Command::Code(_) | Command::Artifact(_) => bail!("command requires a database"),
    }
    Ok(())
}

fn run_code(conn: &mut Connection, command: CodeCommand) -> Result<()> {
    let mut service = MainCodeService::new(SqliteMainCodeRepository::try_new(conn)?);
    match command {
        CodeCommand::New(fields) => {
            let main_code = service.create_main_code(&draft_from(fields))?;
            print_main_code(&main_code);
        }
        CodeCommand::Seed { code, fields } => {
            let main_code = service.seed_main_code(&code, &draft_from(fields))?;
            print_main_code(&main_code);
        }
        CodeCommand::List {
            code,
            finding_place,
            q,
            ordering,
            page,
            page_size,
        } => {
            let ordering = MainCodeOrdering::parse(&ordering)
                .ok_or_else(|| anyhow!("unsupported ordering `{ordering}`"))?;
            let page = service.list_main_codes(&MainCodeListQuery {
                code,
                finding_place,
                q,
                ordering,
                page,
                page_size,
            })?;
            for main_code in &page.items {
                println!("{}\t{}", main_code.code, main_code.attrs.finding_place);
            }
            println!(
                "page={}/{} total={}",
                page.page,
                page.page_count(),
                page.total
            );
        }
        CodeCommand::Show { code } => {
            let main_code = service
                .get_by_code(&code)?
                .ok_or_else(|| anyhow!("main code `{code}` not found"))?;
            print_main_code(&main_code);
        }
        CodeCommand::Delete { code } => {
            let main_code = service
                .get_by_code(&code)?
                .ok_or_else(|| anyhow!("main code `{code}` not found"))?;
            service.delete_main_code(main_code.id)?;
            println!("deleted={}", main_code.code);
        }
        CodeCommand::Cursor => {
            let state = service.sequence_state()?;
            println!("last_code={}", state.last_code.as_deref().unwrap_or("-"));
            println!("remaining={}", state.remaining);
        }
    }
    Ok(())
}

fn run_artifact(conn: &mut Connection, command: ArtifactCommand) -> Result<()> {
    match command {
        ArtifactCommand::Add {
            code,
            artifact_no,
            date,
            form_type,
            production_material,
            period,
            piece_date,
            notes,
            source_and_reference,
            inventory,
            details,
            measurements,
        } => {
            let main_code = find_main_code(conn, &code)?;
            let mut draft = ArtifactDraft::new(main_code.id, artifact_no, date);
            draft.form_type = FormType::parse(&form_type)
                .ok_or_else(|| anyhow!("unsupported form type `{form_type}`"))?;
            draft.production_material = production_material;
            draft.period = period;
            draft.piece_date = piece_date;
            draft.notes = notes;
            draft.source_and_reference = source_and_reference;
            draft.is_inventory = inventory;
            if let Some(raw) = details {
                draft.details = parse_json_arg("details", &raw)?;
            }
            if let Some(raw) = measurements {
                draft.measurements = parse_json_arg("measurements", &raw)?;
            }

            let service = ArtifactService::new(SqliteArtifactRepository::try_new(conn)?);
            let artifact = service.create_artifact(&draft)?;
            println!("full_artifact_no={}", artifact.full_artifact_no());
            println!("id={}", artifact.id);
        }
        ArtifactCommand::List {
            code,
            finding_place,
            form_type,
            artifact_no,
            production_material,
            period,
            date_from,
            date_to,
            q,
            ordering,
            page,
            page_size,
        } => {
            let form_type = form_type
                .map(|value| {
                    FormType::parse(&value)
                        .ok_or_else(|| anyhow!("unsupported form type `{value}`"))
                })
                .transpose()?;
            let ordering = ArtifactOrdering::parse(&ordering)
                .ok_or_else(|| anyhow!("unsupported ordering `{ordering}`"))?;
            let service = ArtifactService::new(SqliteArtifactRepository::try_new(conn)?);
            let page = service.list_artifacts(&ArtifactListQuery {
                main_code_id: None,
                form_type,
                main_code_code: code,
                finding_place,
                artifact_no,
                production_material,
                period,
                date_from,
                date_to,
                q,
                ordering,
                page,
                page_size,
            })?;
            for artifact in &page.items {
                println!(
                    "{}\t{}\t{}\t{}",
                    artifact.full_artifact_no(),
                    artifact.fields.artifact_date,
                    artifact.fields.form_type,
                    artifact.main_code_finding_place
                );
            }
            println!(
                "page={}/{} total={}",
                page.page,
                page.page_count(),
                page.total
            );
        }
        ArtifactCommand::Check { code, artifact_no } => {
            let main_code = find_main_code(conn, &code)?;
            let service = ArtifactService::new(SqliteArtifactRepository::try_new(conn)?);
            let free = service.check_unique(main_code.id, artifact_no, None)?;
            println!(
                "full_artifact_no={} available={free}",
                kazi_core::full_artifact_no(&main_code.code, artifact_no)
            );
        }
        ArtifactCommand::Export {
            full_no,
            format,
            out,
        } => {
            let format = ExportFormat::parse(&format)?;
            let service = ArtifactService::new(SqliteArtifactRepository::try_new(conn)?);
            let artifact = service
                .get_by_full_no(&full_no)?
                .ok_or_else(|| anyhow!("artifact `{full_no}` not found"))?;
            let document = service.export_artifact(artifact.id, format)?;
            match out {
                Some(dir) => {
                    let path = dir.join(&document.filename);
                    write_document(&path, &document.bytes)?;
                    println!("wrote={}", path.display());
                }
                None => std::io::stdout()
                    .write_all(&document.bytes)
                    .context("failed to write export to stdout")?,
            }
        }
    }
    Ok(())
}

fn find_main_code(conn: &mut Connection, code: &str) -> Result<MainCode> {
    let service = MainCodeService::new(SqliteMainCodeRepository::try_new(conn)?);
    service
        .get_by_code(code)?
        .ok_or_else(|| anyhow!("main code `{code}` not found"))
}

fn draft_from(fields: MainCodeFields) -> MainCodeDraft {
    MainCodeDraft {
        finding_place: fields.finding_place,
        plan_square: fields.plan_square,
        description: fields.description,
        layer: fields.layer,
        level: fields.level,
        grave_no: fields.grave_no,
        gis: fields.gis,
    }
}

fn parse_json_arg(name: &str, raw: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("--{name} is not valid JSON"))?;
    if !value.is_object() {
        bail!("--{name} must be a JSON object");
    }
    Ok(value)
}

fn write_document(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create `{}`", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("failed to write `{}`", path.display()))
}

fn print_main_code(main_code: &MainCode) {
    let attrs = &main_code.attrs;
    println!("code={}", main_code.code);
    println!("id={}", main_code.id);
    println!("finding_place={}", attrs.finding_place);
    for (key, value) in [
        ("plan_square", &attrs.plan_square),
        ("description", &attrs.description),
        ("layer", &attrs.layer),
        ("level", &attrs.level),
        ("grave_no", &attrs.grave_no),
        ("gis", &attrs.gis),
    ] {
        if let Some(value) = value {
            println!("{key}={value}");
        }
    }
}
