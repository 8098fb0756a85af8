//! The `dialang run` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use dialang_capture::{spawn_writer, CaptureWriter, JsonlStore};
use dialang_core::capture::{EventSink, NoopSink};
use dialang_core::engine::BasketOutcome;
use dialang_core::scoring::ItemResponse;
use dialang_core::{ReferenceCatalog, TestEngine, TestSession};

use crate::config::load_config_from;
use crate::script::SessionScript;

pub async fn execute(
    script_path: PathBuf,
    catalog_dir: Option<PathBuf>,
    capture_path: Option<PathBuf>,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let script = SessionScript::load(&script_path)?;

    let catalog_dir = catalog_dir.unwrap_or_else(|| config.catalog_dir.clone());
    let catalog = Arc::new(ReferenceCatalog::load_dir(&catalog_dir)?);

    let capture_path = capture_path.or_else(|| config.capture_file.clone());
    let (sink, writer): (Arc<dyn EventSink>, Option<CaptureWriter>) = match &capture_path {
        Some(path) => {
            let store = JsonlStore::open(path).await?;
            let (sink, writer) = spawn_writer(Arc::new(store));
            let sink: Arc<dyn EventSink> = Arc::new(sink);
            (sink, Some(writer))
        }
        None => {
            let sink: Arc<dyn EventSink> = Arc::new(NoopSink);
            (sink, None)
        }
    };

    let engine = TestEngine::new(catalog, sink, config.engine_config());
    let outcome = drive(&engine, &script);

    // The writer only stops once the engine's sink is gone.
    drop(engine);
    if let (Some(writer), Some(path)) = (writer, &capture_path) {
        let stats = writer.finish().await?;
        eprintln!(
            "Capture: {} event(s) written to {}, {} failed",
            stats.written,
            path.display(),
            stats.failed
        );
    }

    let (session, redirect) = outcome?;
    print_result(&session, redirect.as_deref());

    if let Some(path) = output {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&session)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write session: {}", path.display()))?;
        eprintln!("Session saved to: {}", path.display());
    }

    Ok(())
}

/// Walk a session from admin language to the final basket.
fn drive(engine: &TestEngine, script: &SessionScript) -> Result<(TestSession, Option<String>)> {
    let mut session = engine.set_admin_language(&script.admin_language, script.tes.clone())?;
    engine.set_test_language(
        &mut session,
        &script.test_language,
        &script.skill,
        script.client.clone(),
    )?;

    if let Some(fields) = script.vspt_fields()? {
        engine.submit_vspt(&mut session, &fields)?;
    }
    if let Some(fields) = script.sa_fields()? {
        engine.submit_sa(&mut session, &fields)?;
    }

    let start = engine.start_test(&mut session)?;
    eprintln!(
        "Booklet {} ({} items), starting at basket {}",
        session.booklet_id.unwrap_or_default(),
        start.total_items,
        start.start_basket_id
    );

    let mut basket_id = start.start_basket_id;
    let redirect = loop {
        let fields = script.basket_fields(basket_id)?;
        let outcome = engine
            .submit_basket(&mut session, &fields)
            .with_context(|| format!("basket {basket_id} rejected"))?;

        let scored = outcome.scored_basket();
        let correct = scored.items.iter().filter(|i| i.correct).count();
        eprintln!(
            "  Basket {} [{}]: {}/{} correct",
            scored.id,
            scored.basket_type,
            correct,
            scored.items.len()
        );

        match outcome {
            BasketOutcome::Next { next_basket_id, .. } => basket_id = next_basket_id,
            BasketOutcome::Done { .. } => break None,
            BasketOutcome::Redirect { redirect, .. } => break Some(redirect),
        }
    };

    if let Some(fields) = script.questionnaire_fields()? {
        engine.submit_questionnaire(&session, &fields)?;
    }

    Ok((session, redirect))
}

fn print_result(session: &TestSession, redirect: Option<&str>) {
    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);

    let mut row = |field: &str, value: String| {
        table.add_row(vec![Cell::new(field), Cell::new(value)]);
    };

    row("Session", session.session_id.to_string());
    row(
        "Test",
        format!("{} / {}", session.test_language, session.skill),
    );
    row("Phase", session.phase.to_string());
    if let Some(booklet_id) = session.booklet_id {
        row("Booklet", booklet_id.to_string());
    }
    if let Some(vspt) = &session.vspt {
        row("VSPT", format!("{} ({})", vspt.meara_score, vspt.level));
    }
    if let Some(sa) = &session.sa {
        row("Self-assessment", format!("{:.2} ({})", sa.ppe, sa.level));
    }
    if let Some(result) = &session.result {
        row(
            "Raw score",
            format!("{}/{}", result.raw_score, result.total_weight),
        );
        row("Grade", result.grade.to_string());
        row("Level", result.level.to_string());
    }
    if let Some(url) = redirect {
        row("Redirect", url.to_string());
    }
    println!("{table}");

    let mut items = Table::new();
    items.set_header(vec!["#", "Basket", "Item", "Type", "Response", "Correct", "Score"]);
    for item in &session.scored_items {
        let response = match &item.response {
            ItemResponse::Answer(id) => id.to_string(),
            ItemResponse::Text(text) => format!("{text:?}"),
        };
        items.add_row(vec![
            Cell::new(item.position_in_test),
            Cell::new(item.basket_id),
            Cell::new(item.item.id),
            Cell::new(&item.item.item_type),
            Cell::new(response),
            Cell::new(if item.correct { "yes" } else { "no" }),
            Cell::new(item.score),
        ]);
    }
    println!("{items}");
}
