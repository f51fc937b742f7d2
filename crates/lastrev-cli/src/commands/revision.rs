//! Revision command handlers

use anyhow::{bail, Context, Result};

use lastrev_core::{RevisionKey, RevisionRecord, RevisionStore};

use crate::output::Output;

/// Create the schema if needed
pub fn init(store: &impl RevisionStore, output: &Output) -> Result<()> {
    store
        .ensure_schema()
        .context("Failed to initialize revision schema")?;
    output.success("Revision schema ready");
    Ok(())
}

/// Show the last revision for a key
pub fn get(
    store: &impl RevisionStore,
    model_id: String,
    user_email: String,
    output: &Output,
) -> Result<()> {
    let revision = store
        .get_last_revision(&model_id, &user_email)
        .with_context(|| format!("Failed to read revision for {}/{}", model_id, user_email))?;

    output.print_revision(&RevisionRecord::new(
        RevisionKey::new(model_id, user_email),
        revision,
    ));
    Ok(())
}

/// Record a revision unconditionally
pub fn save(
    store: &impl RevisionStore,
    model_id: String,
    user_email: String,
    revision: i64,
    output: &Output,
) -> Result<()> {
    store
        .save_last_revision(&model_id, &user_email, revision)
        .with_context(|| format!("Failed to save revision for {}/{}", model_id, user_email))?;

    output.success(&format!(
        "Saved revision {} for {}/{}",
        revision, model_id, user_email
    ));
    Ok(())
}

/// Record a revision only if the stored one still equals `expected`
pub fn compare_and_swap(
    store: &impl RevisionStore,
    model_id: String,
    user_email: String,
    expected: i64,
    revision: i64,
    output: &Output,
) -> Result<()> {
    let swapped = store
        .save_last_revision_if_current(&model_id, &user_email, expected, revision)
        .with_context(|| format!("Failed to swap revision for {}/{}", model_id, user_email))?;

    if !swapped {
        let current = store
            .get_last_revision(&model_id, &user_email)
            .with_context(|| format!("Failed to read revision for {}/{}", model_id, user_email))?;
        bail!(
            "Revision for {}/{} is {}, expected {}; nothing written",
            model_id,
            user_email,
            current,
            expected
        );
    }

    output.success(&format!(
        "Swapped revision {} -> {} for {}/{}",
        expected, revision, model_id, user_email
    ));
    Ok(())
}

/// List every recorded key
pub fn list(store: &impl RevisionStore, output: &Output) -> Result<()> {
    let records = store.records().context("Failed to list revisions")?;
    output.print_records(&records);
    Ok(())
}
