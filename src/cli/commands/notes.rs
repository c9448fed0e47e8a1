use anyhow::Result;

use super::{print_json, with_service};
use crate::config::FluxoConfig;
use crate::model::ProjectId;

pub struct NotesCommand {
    pub project: ProjectId,
    pub json: bool,
}

impl NotesCommand {
    pub fn new(project: ProjectId, json: bool) -> Self {
        Self { project, json }
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let (project_id, json) = (self.project, self.json);
        with_service(config, |service, _actor| async move {
            let notes = service.project_notes(project_id).await?;
            if json {
                return print_json(&notes);
            }
            for note in &notes {
                let marker = if note.is_system() { "⚙️ " } else { "📝" };
                println!(
                    "{marker} {} {}: {}",
                    note.created_at.format("%d/%m/%Y %H:%M"),
                    note.author_name,
                    note.content
                );
            }
            Ok(())
        })
        .await
    }
}

pub struct NoteCommand {
    pub project: ProjectId,
    pub content: String,
    pub json: bool,
}

impl NoteCommand {
    pub fn new(project: ProjectId, content: String, json: bool) -> Self {
        Self {
            project,
            content,
            json,
        }
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let (project_id, json) = (self.project, self.json);
        let content = self.content.clone();
        with_service(config, |service, actor| async move {
            let note = service.add_note(project_id, &content, &actor).await?;
            if json {
                return print_json(&note);
            }
            println!("📝 Note added by {}", note.author_name);
            Ok(())
        })
        .await
    }
}

pub struct HistoryCommand {
    pub project: ProjectId,
    pub json: bool,
}

impl HistoryCommand {
    pub fn new(project: ProjectId, json: bool) -> Self {
        Self { project, json }
    }

    pub async fn execute(&self, config: &FluxoConfig) -> Result<()> {
        let (project_id, json) = (self.project, self.json);
        with_service(config, |service, _actor| async move {
            let history = service.stage_history(project_id).await?;
            if json {
                return print_json(&history);
            }
            for entry in &history {
                let from = entry.from.as_deref().unwrap_or("∅");
                println!(
                    "🕒 {} batch {}: {} → {} ({})",
                    entry.at.format("%d/%m/%Y %H:%M"),
                    entry.batch_id,
                    from,
                    entry.to,
                    entry.author_name
                );
            }
            Ok(())
        })
        .await
    }
}
