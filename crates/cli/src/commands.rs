use std::collections::HashSet;
use std::io::Write as _;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::Utc;
use futures::StreamExt;
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

use japa_client::assistant::{AssistantChat, SUGGESTED_QUESTIONS};
use japa_client::documents::{delete_document, upload_document, UploadRequest};
use japa_client::messaging::{start_conversation, ChatView};
use japa_client::oauth::OAuthCallback;
use japa_client::storage::{FirebaseStorage, StorageError};
use japa_core::agent::{specialization_label, AgentFilters};
use japa_core::auth::{RegisterRequest, Role, User};
use japa_core::countries::country_label;
use japa_core::documents::{status_counts, StatusFilter};
use japa_core::format::{format_date, format_message_time};
use japa_core::messaging::Message;
use japa_core::recommendation::{progress, RecommendationOption, RecommendationResponse};
use japa_core::snapshot::SnapshotStore;
use japa_core::types::DbId;
use japa_core::wizard::{AgentFlow, IntakeFlow, Wizard, WizardError, WizardFlow};

use crate::{App, Command, DocumentsCommand};

pub async fn run(app: &App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            let user = app.session.login(&email, &password).await?;
            println!("Signed in as {} <{}>", user.name, user.email);
        }
        Command::Register {
            name,
            email,
            password,
            agent,
        } => {
            let request = RegisterRequest {
                name,
                email,
                password,
                role: if agent { Role::TravelAgent } else { Role::User },
            };
            let user = app.session.register(&request).await?;
            println!("Welcome, {}! Run `japa {}` next.", user.name, next_wizard(&user));
        }
        Command::Google { agent } => google_sign_in(app, agent.then_some(Role::TravelAgent)).await?,
        Command::Logout => {
            app.session.logout();
            println!("Signed out");
        }
        Command::Whoami => whoami(app)?,
        Command::Profile => {
            app.require_user()?;
            match app.session.onboarding() {
                Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
                None => println!("No onboarding profile yet. Run `japa onboard <answers.json>`."),
            }
        }
        Command::Onboard { answers } => onboard(app, &answers).await?,
        Command::AgentOnboard { answers } => agent_onboard(app, &answers).await?,
        Command::Recommendations { cached, checklist } => {
            app.require_user()?;
            let response = app.api().get_recommendations(cached, None).await?;
            print_recommendations(&response);
            if let Some(number) = checklist {
                let option = number
                    .checked_sub(1)
                    .and_then(|i| response.options.get(i))
                    .with_context(|| format!("No recommendation option {number}"))?;
                print_checklist(app, option).await?;
            }
        }
        Command::History { limit } => {
            app.require_user()?;
            for record in app.api().recommendation_history(limit).await? {
                let created = record
                    .created_at
                    .map(|at| format_date(&at.to_rfc3339()))
                    .unwrap_or_default();
                println!(
                    "#{:<5} {:<14} {} option(s): {}",
                    record.id,
                    created,
                    record.response.options.len(),
                    record.response.summary
                );
            }
        }
        Command::Documents { action } => documents(app, action).await?,
        Command::Agents {
            country,
            destination,
            specialization,
        } => {
            app.require_user()?;
            let filters = AgentFilters {
                country,
                destination,
                specialization,
            };
            let agents = app.api().list_agents(&filters).await?;
            if agents.is_empty() {
                println!("No travel agents match those filters");
            }
            for agent in agents {
                let verified = if agent.is_verified { " (verified)" } else { "" };
                println!(
                    "#{:<5} {}{} - {}",
                    agent.id,
                    agent.display_name(),
                    verified,
                    agent
                        .country_of_operation
                        .as_deref()
                        .map(country_label)
                        .unwrap_or("Unknown country"),
                );
                if !agent.specializations.is_empty() {
                    let labels: Vec<&str> = agent
                        .specializations
                        .iter()
                        .map(|code| specialization_label(code))
                        .collect();
                    println!("       {}", labels.join(", "));
                }
            }
        }
        Command::Conversations => {
            let user = app.require_user()?;
            let now = Utc::now();
            for conversation in app.api().list_conversations().await? {
                let unread = match conversation.unread_count {
                    0 => String::new(),
                    n => format!(" [{n} unread]"),
                };
                println!(
                    "#{:<5} {:<24} {:>8}{}  {}",
                    conversation.id,
                    conversation.other_party_name(user.role),
                    format_message_time(conversation.last_message_at.as_deref(), now),
                    unread,
                    conversation.preview(),
                );
            }
        }
        Command::Contact { agent_id, message } => {
            app.require_user()?;
            let conversation = start_conversation(app.api(), agent_id, message.as_deref()).await?;
            println!("Conversation #{} started", conversation.id);
        }
        Command::Watch { conversation_id } => watch(app, conversation_id).await?,
        Command::Send {
            conversation_id,
            text,
        } => {
            let user = app.require_user()?;
            let mut view = ChatView::new(app.api(), app.config.poll_interval);
            view.open(conversation_id, &user).await?;
            let sent = view.send(&text.join(" ")).await;
            view.close().await;
            let message = sent?;
            println!("Sent message #{}", message.id);
        }
        Command::Ask { question } => {
            let mut chat = AssistantChat::new(app.api());
            match chat.send(&question.join(" ")).await {
                Some(reply) => println!("{reply}"),
                None => {
                    println!("Try asking:");
                    for suggestion in SUGGESTED_QUESTIONS {
                        println!("  {suggestion}");
                    }
                }
            }
        }
    }
    Ok(())
}

fn next_wizard(user: &User) -> &'static str {
    if user.is_agent() {
        "agent-onboard <answers.json>"
    } else {
        "onboard <answers.json>"
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

async fn google_sign_in(app: &App, role: Option<Role>) -> anyhow::Result<()> {
    let pending = app.session.begin_google_sign_in()?;
    println!("Open this URL to sign in with Google:\n\n  {}\n", pending.authorization_url);
    print!("Paste the URL you were redirected to: ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let callback = OAuthCallback::from_redirect_url(line.trim())?;
    let user = app
        .session
        .complete_google_sign_in(&pending, callback, role)
        .await?;
    println!("Signed in as {} <{}>", user.name, user.email);
    Ok(())
}

fn whoami(app: &App) -> anyhow::Result<()> {
    let user = app.require_user()?;
    let role = match user.role {
        Role::User => "applicant",
        Role::TravelAgent => "travel agent",
    };
    println!("{} <{}> ({role}, id {})", user.name, user.email, user.id);
    if app.session.onboarding().is_none() && !user.is_agent() {
        println!("Onboarding not completed");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Onboarding
// ---------------------------------------------------------------------------

async fn read_answers(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    match value {
        Value::Object(answers) => Ok(answers),
        _ => bail!("{} must contain a JSON object of field answers", path.display()),
    }
}

/// Apply answers and advance to the final step, reporting the first
/// incomplete step.
fn complete_steps<F: WizardFlow>(
    wizard: &mut Wizard<F>,
    answers: Map<String, Value>,
) -> anyhow::Result<()> {
    for (name, value) in answers {
        wizard.set_field(&name, value)?;
    }
    while !wizard.is_final_step() {
        let label = wizard.step_label();
        match wizard.go_next() {
            Ok(step) => tracing::debug!(step, "Completed {label}"),
            Err(WizardError::StepIncomplete { step, errors }) => {
                eprintln!("Step {step} ({label}) is incomplete:");
                for (field, message) in &errors {
                    eprintln!("  {field}: {message}");
                }
                bail!("Fill in the missing answers and run the command again");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

async fn onboard(app: &App, answers: &Path) -> anyhow::Result<()> {
    let user = app.require_user()?;
    if user.is_agent() {
        bail!("Travel agents onboard with `japa agent-onboard`");
    }
    let answers = read_answers(answers).await?;

    let has_snapshot = app.snapshots.load(user.id)?.is_some();
    let mut wizard = Wizard::<IntakeFlow>::resume(user.id, app.snapshots.clone());
    if !has_snapshot {
        match app.api().get_profile().await {
            Ok(record) => wizard.load_existing(&record),
            Err(e) => tracing::debug!(error = %e, "Starting from an empty form"),
        }
    }
    complete_steps(&mut wizard, answers)?;

    let outcome = wizard.submit(&app.session, app.api()).await?;
    println!("Profile saved");
    match outcome.recommendations {
        Some(response) => print_recommendations(&response),
        None => println!("Recommendations are not ready yet. Try `japa recommendations` later."),
    }
    Ok(())
}

async fn agent_onboard(app: &App, answers: &Path) -> anyhow::Result<()> {
    let user = app.require_user()?;
    if !user.is_agent() {
        bail!("Only travel agent accounts can run the agent wizard");
    }
    let answers = read_answers(answers).await?;

    let has_snapshot = app.snapshots.load(user.id)?.is_some();
    let mut wizard = Wizard::<AgentFlow>::resume(user.id, app.snapshots.clone());
    if !has_snapshot {
        match app.api().get_agent_profile().await {
            Ok(record) => wizard.load_existing(&record),
            Err(e) => tracing::debug!(error = %e, "Starting from the default agent form"),
        }
    }
    complete_steps(&mut wizard, answers)?;

    let record = wizard.submit(app.api()).await?;
    let status = if record.is_verified { "verified" } else { "pending verification" };
    println!("Agent profile saved ({status})");
    Ok(())
}

// ---------------------------------------------------------------------------
// Recommendations
// ---------------------------------------------------------------------------

fn print_recommendations(response: &RecommendationResponse) {
    println!("{}\n", response.summary);
    for (index, option) in response.options.iter().enumerate() {
        let likelihood = option.likelihood.as_deref().unwrap_or("unknown");
        println!("{}. {} (likelihood: {likelihood})", index + 1, option.visa_type);
        println!("   {}", option.reasoning);
        if let Some(timeline) = &option.estimated_timeline {
            println!("   Timeline: {timeline}");
        }
        if let Some(costs) = &option.estimated_costs {
            println!("   Costs: {costs}");
        }
        for flag in option.risk_flags.iter().flatten() {
            println!("   ! {flag}");
        }
    }
    for note in response.notes.iter().flatten() {
        println!("Note: {note}");
    }
}

async fn print_checklist(app: &App, option: &RecommendationOption) -> anyhow::Result<()> {
    let items = match &option.checklist {
        Some(items) if !option.needs_checklist() => items.clone(),
        _ => app.api().generate_checklist(option).await?,
    };
    let (done, total) = progress(&items);
    println!("\nChecklist for {} ({done}/{total} done)", option.visa_type);
    for (index, item) in items.iter().enumerate() {
        let mark = if item.completed { "x" } else { " " };
        println!("  [{mark}] {}", item.display_title(index));
        if let Some(description) = &item.description {
            println!("      {description}");
        }
        if !item.documents.is_empty() {
            println!("      Documents: {}", item.documents.join(", "));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

fn storage(app: &App) -> Result<FirebaseStorage, StorageError> {
    let bucket = app
        .config
        .storage_bucket
        .clone()
        .ok_or(StorageError::MissingBucket)?;
    let client = reqwest::Client::builder()
        .timeout(app.config.request_timeout)
        .build()?;
    Ok(FirebaseStorage::new(client, &app.config.storage_url, bucket))
}

fn content_type_for(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return None,
    };
    Some(mime.to_string())
}

async fn documents(app: &App, action: DocumentsCommand) -> anyhow::Result<()> {
    app.require_user()?;
    match action {
        DocumentsCommand::List { status } => {
            let documents = app.api().list_documents(status).await?;
            if status == StatusFilter::All {
                let counts: Vec<String> = status_counts(&documents)
                    .iter()
                    .map(|(status, count)| format!("{} {count}", status.label()))
                    .collect();
                println!("{} document(s): {}", documents.len(), counts.join(", "));
            }
            for document in documents {
                let uploaded = document
                    .uploaded_at
                    .map(|at| format_date(&at.to_rfc3339()))
                    .unwrap_or_default();
                println!(
                    "#{:<5} {:<9} {:<32} {:<10} {:>9}  {}",
                    document.id,
                    document.status.label(),
                    document.name,
                    document.doc_type.as_deref().unwrap_or("-"),
                    document.size.as_deref().unwrap_or("-"),
                    uploaded,
                );
            }
        }
        DocumentsCommand::Upload {
            file,
            name,
            doc_type,
            description,
        } => {
            let storage = storage(app)?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("File name is not valid UTF-8")?
                .to_string();

            let mut request = UploadRequest::for_file(file_name, bytes);
            if let Some(name) = name {
                request.name = name;
            }
            request.doc_type = doc_type;
            request.description = description;
            request.content_type = content_type_for(&file);

            let progress = |percent: u8| {
                eprint!("\rUploading... {percent:>3}%");
                if percent == 100 {
                    eprintln!();
                }
            };
            let record = upload_document(app.api(), &storage, request, &progress).await?;
            println!("Uploaded document #{} ({})", record.id, record.name);
        }
        DocumentsCommand::Delete { id } => {
            let storage = storage(app)?;
            let document = app.api().get_document(id).await?;
            delete_document(app.api(), &storage, &document).await?;
            println!("Deleted document #{id}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

fn print_message(message: &Message, viewer: &User, other_party: &str) {
    let who = if message.is_from(viewer) { "You" } else { other_party };
    let time = format_message_time(message.created_at.as_deref(), Utc::now());
    println!("[{time}] {who}: {}", message.content);
}

async fn watch(app: &App, conversation_id: DbId) -> anyhow::Result<()> {
    let user = app.require_user()?;
    let mut view = ChatView::new(app.api(), app.config.poll_interval);
    let conversation = view.open(conversation_id, &user).await?;
    let other_party = conversation.other_party_name(user.role).to_string();
    match conversation.other_party_subtitle(user.role) {
        Some(subtitle) => println!("Conversation with {other_party} ({subtitle})"),
        None => println!("Conversation with {other_party}"),
    }
    if let Some(summary) = view.profile_summary() {
        println!("{}", serde_json::to_string_pretty(summary)?);
    }
    println!("Press Ctrl-C to stop.\n");

    let mut stream = view
        .subscription_mut()
        .map(|subscription| subscription.stream())
        .context("Conversation is not being refreshed")?;
    let mut seen: HashSet<DbId> = HashSet::new();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            next = stream.next() => {
                let Some(messages) = next else { break };
                for message in messages.iter().filter(|m| seen.insert(m.id)) {
                    print_message(message, &user, &other_party);
                }
            }
        }
    }

    view.close().await;
    tracing::debug!(conversation_id, "Stopped watching");
    Ok(())
}
