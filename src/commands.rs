use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::client::GreenMatesApi;
use crate::error::ApiError;
use crate::feed::{EventFeed, FetchState};
use crate::forms::{self, DonationForm, EventDetails};
use crate::models::{CollectionEvent, User, WorkshopEvent};
use crate::progress::Capacity;
use crate::schedule::format_local;

/// Who is acting, against which API, and how to show times to them.
pub struct Session<A> {
    pub api: Arc<A>,
    pub federated_id: String,
    pub tz: Tz,
}

impl<A: GreenMatesApi> Session<A> {
    fn feed(&self) -> EventFeed<A> {
        EventFeed::new(Arc::clone(&self.api), self.federated_id.clone())
    }
}

fn require_id(what: &str, id: &str) -> Result<(), ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::validation(format!("{what} must not be empty")));
    }
    Ok(())
}

pub async fn register<A: GreenMatesApi>(
    api: &A,
    federated_id: &str,
    username: &str,
    email: &str,
) -> Result<(), ApiError> {
    require_id("federated id", federated_id)?;
    if username.trim().is_empty() {
        return Err(ApiError::validation("username is required"));
    }
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::validation(format!("{email:?} is not an email address")));
    }
    let user = User {
        collaborator_id: String::new(),
        federated_id: federated_id.trim().to_string(),
        username: username.trim().to_string(),
        email: email.to_string(),
    };
    api.create_user(&user).await
}

pub async fn create_collection<A: GreenMatesApi>(
    api: &A,
    organizer_id: &str,
    details: &EventDetails,
    tz: Tz,
) -> Result<(), ApiError> {
    let event = forms::collection_event(organizer_id, details, tz)?;
    api.create_collection(&event).await
}

pub async fn create_workshop<A: GreenMatesApi>(
    api: &A,
    organizer_id: &str,
    title: &str,
    pillar: &str,
    details: &EventDetails,
    tz: Tz,
) -> Result<(), ApiError> {
    let event = forms::workshop_event(organizer_id, title, pillar, details, tz)?;
    api.create_workshop(&event).await
}

/// One PATCH, no local append. The caller re-fetches once this succeeds.
pub async fn submit_donation<A: GreenMatesApi>(
    api: &A,
    collection_id: &str,
    contributor_id: &str,
    form: &DonationForm,
) -> Result<(), ApiError> {
    require_id("collection id", collection_id)?;
    let body = forms::donation(contributor_id, form)?;
    api.add_donation(collection_id.trim(), &body).await?;
    info!(
        "Donated {} kg to collection {}",
        body.materials.total_kg(),
        collection_id.trim()
    );
    Ok(())
}

pub async fn submit_attendance<A: GreenMatesApi>(
    api: &A,
    workshop_id: &str,
    contributor_id: &str,
) -> Result<(), ApiError> {
    require_id("workshop id", workshop_id)?;
    let body = forms::attendance(contributor_id)?;
    api.add_assistant(workshop_id.trim(), &body).await?;
    info!("Registered attendance at workshop {}", workshop_id.trim());
    Ok(())
}

fn collection_line(event: &CollectionEvent, tz: Tz) -> String {
    format!(
        "  [{}] {} - {}  at {}, {}  {} donations / {} ({}%), {} kg",
        event.id,
        format_local(event.start_time, tz),
        format_local(event.end_time, tz),
        event.latitude,
        event.longitude,
        event.contribution_count(),
        event.capacity_limit.max(1),
        event.progress(),
        event.total_kg(),
    )
}

fn workshop_line(event: &WorkshopEvent, tz: Tz) -> String {
    format!(
        "  [{}] {} ({})  {}  at {}, {}  {} / {} attending ({}%)",
        event.id,
        event.title,
        event.pillar,
        format_local(event.start_time, tz),
        event.latitude,
        event.longitude,
        event.contribution_count(),
        event.capacity_limit.max(1),
        event.progress(),
    )
}

fn list_text<T>(
    heading: &str,
    state: &FetchState<T>,
    empty: &str,
    line: impl Fn(&T) -> String,
) -> String {
    let mut out = format!("{heading}\n");
    match state {
        FetchState::Idle => {}
        FetchState::Loading => out.push_str("  Loading...\n"),
        FetchState::Failed(message) => {
            let _ = writeln!(out, "  Error: {message}");
        }
        FetchState::Loaded(items) if items.is_empty() => {
            let _ = writeln!(out, "  {empty}");
        }
        FetchState::Loaded(items) => {
            for item in items {
                let _ = writeln!(out, "{}", line(item));
            }
        }
    }
    out
}

pub fn collections_text(state: &FetchState<CollectionEvent>, tz: Tz) -> String {
    list_text("Collections", state, "No collections available", |e| {
        collection_line(e, tz)
    })
}

pub fn workshops_text(state: &FetchState<WorkshopEvent>, tz: Tz) -> String {
    list_text("Workshops", state, "No workshops available", |e| workshop_line(e, tz))
}

pub fn collection_detail(event: &CollectionEvent, tz: Tz) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Collection {}\n  {} - {}\n  Location: {}, {}",
        event.id,
        format_local(event.start_time, tz),
        format_local(event.end_time, tz),
        event.latitude,
        event.longitude
    );
    let _ = writeln!(
        out,
        "  Progress: {}% ({} of {}, {} spots left)",
        event.progress(),
        event.contribution_count(),
        event.capacity_limit.max(1),
        event.remaining_spots()
    );
    let _ = writeln!(out, "  Total collected: {} kg", event.total_kg());
    if event.donations.is_empty() {
        out.push_str("  No donations yet\n");
    }
    for donation in &event.donations {
        let name = if donation.contributor_name.is_empty() {
            donation.contributor_id.as_str()
        } else {
            donation.contributor_name.as_str()
        };
        let items: Vec<String> = donation
            .materials
            .breakdown()
            .iter()
            .filter(|(_, kg)| *kg > 0)
            .map(|(label, kg)| format!("{label} {kg} kg"))
            .collect();
        let _ = writeln!(
            out,
            "  - {}: {} kg ({})",
            name,
            donation.total_kg(),
            items.join(", ")
        );
    }
    out
}

pub fn workshop_detail(event: &WorkshopEvent, tz: Tz) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Workshop {}: {}\n  Pillar: {}\n  {} - {}\n  Location: {}, {}",
        event.id,
        event.title,
        event.pillar,
        format_local(event.start_time, tz),
        format_local(event.end_time, tz),
        event.latitude,
        event.longitude
    );
    let _ = writeln!(
        out,
        "  Progress: {}% ({} of {}, {} spots left)",
        event.progress(),
        event.contribution_count(),
        event.capacity_limit.max(1),
        event.remaining_spots()
    );
    if event.assistants.is_empty() {
        out.push_str("  No one signed up yet\n");
    }
    for assistant in &event.assistants {
        let name = if assistant.contributor_name.is_empty() {
            assistant.contributor_id.as_str()
        } else {
            assistant.contributor_name.as_str()
        };
        if assistant.email.is_empty() {
            let _ = writeln!(out, "  - {name}");
        } else {
            let _ = writeln!(out, "  - {} <{}>", name, assistant.email);
        }
    }
    out
}

pub async fn run_whoami<A: GreenMatesApi>(session: &Session<A>) -> Result<()> {
    let user = session.api.get_user(&session.federated_id).await?;
    println!("Collaborator {}", user.collaborator_id);
    println!("  Username: {}", user.username);
    println!("  Email:    {}", user.email);
    println!("  FBID:     {}", user.federated_id);
    Ok(())
}

pub async fn run_register<A: GreenMatesApi>(
    session: &Session<A>,
    username: &str,
    email: &str,
) -> Result<()> {
    register(session.api.as_ref(), &session.federated_id, username, email).await?;
    println!("Registered {} ({})", username.trim(), email.trim());
    Ok(())
}

pub async fn run_events<A: GreenMatesApi>(session: &Session<A>) -> Result<()> {
    let mut feed = session.feed();
    feed.refresh();
    feed.settle().await;
    print!("{}", collections_text(feed.collections(), session.tz));
    println!();
    print!("{}", workshops_text(feed.workshops(), session.tz));
    Ok(())
}

pub async fn run_collection<A: GreenMatesApi>(session: &Session<A>, id: &str) -> Result<()> {
    let mut feed = session.feed();
    feed.refresh_collections();
    feed.settle().await;
    show_collection(&feed, id, session.tz)
}

pub async fn run_workshop<A: GreenMatesApi>(session: &Session<A>, id: &str) -> Result<()> {
    let mut feed = session.feed();
    feed.refresh_workshops();
    feed.settle().await;
    show_workshop(&feed, id, session.tz)
}

fn show_collection<A: GreenMatesApi>(feed: &EventFeed<A>, id: &str, tz: Tz) -> Result<()> {
    match feed.collections() {
        FetchState::Loaded(items) => match items.iter().find(|e| e.id == id) {
            Some(event) => {
                print!("{}", collection_detail(event, tz));
                Ok(())
            }
            None => bail!("No collection with id {}", id),
        },
        FetchState::Failed(message) => bail!("Failed to load collections: {}", message),
        _ => bail!("Collections are not loaded"),
    }
}

fn show_workshop<A: GreenMatesApi>(feed: &EventFeed<A>, id: &str, tz: Tz) -> Result<()> {
    match feed.workshops() {
        FetchState::Loaded(items) => match items.iter().find(|e| e.id == id) {
            Some(event) => {
                print!("{}", workshop_detail(event, tz));
                Ok(())
            }
            None => bail!("No workshop with id {}", id),
        },
        FetchState::Failed(message) => bail!("Failed to load workshops: {}", message),
        _ => bail!("Workshops are not loaded"),
    }
}

/// Prints a note when the re-fetch after a write cannot show the event. The
/// feed only lists events the session organizes.
fn note_unshown(shown: Result<()>, kind: &str, id: &str) {
    if let Err(e) = shown {
        println!("{e}. The {kind} organizer can run `greenmates {kind} {id}` to see its progress.");
    }
}

pub async fn run_donate<A: GreenMatesApi>(
    session: &Session<A>,
    collection_id: &str,
    contributor: Option<&str>,
    form: &DonationForm,
) -> Result<()> {
    let contributor_id = contributor.unwrap_or(&session.federated_id);
    if let Err(e) = submit_donation(session.api.as_ref(), collection_id, contributor_id, form).await
    {
        if !e.is_validation() {
            warn!("Donation to {} not registered: {}", collection_id.trim(), e);
        }
        return Err(e.into());
    }
    println!("Donation by {} registered", contributor_id.trim());

    let collection_id = collection_id.trim();
    let mut feed = session.feed();
    feed.refresh_collections();
    feed.settle().await;
    note_unshown(show_collection(&feed, collection_id, session.tz), "collection", collection_id);
    Ok(())
}

pub async fn run_attend<A: GreenMatesApi>(
    session: &Session<A>,
    workshop_id: &str,
    contributor: Option<&str>,
) -> Result<()> {
    let contributor_id = contributor.unwrap_or(&session.federated_id);
    if let Err(e) = submit_attendance(session.api.as_ref(), workshop_id, contributor_id).await {
        if !e.is_validation() {
            warn!("Attendance at {} not registered: {}", workshop_id.trim(), e);
        }
        return Err(e.into());
    }
    println!("Attendance of {} registered", contributor_id.trim());

    let workshop_id = workshop_id.trim();
    let mut feed = session.feed();
    feed.refresh_workshops();
    feed.settle().await;
    note_unshown(show_workshop(&feed, workshop_id, session.tz), "workshop", workshop_id);
    Ok(())
}

pub async fn run_create_collection<A: GreenMatesApi>(
    session: &Session<A>,
    details: &EventDetails,
) -> Result<()> {
    create_collection(session.api.as_ref(), &session.federated_id, details, session.tz).await?;
    println!("Collection created");
    run_events(session).await
}

pub async fn run_create_workshop<A: GreenMatesApi>(
    session: &Session<A>,
    title: &str,
    pillar: &str,
    details: &EventDetails,
) -> Result<()> {
    create_workshop(
        session.api.as_ref(),
        &session.federated_id,
        title,
        pillar,
        details,
        session.tz,
    )
    .await?;
    println!("Workshop created");
    run_events(session).await
}
