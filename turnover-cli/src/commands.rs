//! One function per subcommand. Each builds the services it needs from
//! [`App`], runs one operation and prints the outcome.

use std::collections::BTreeSet;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};
use turnover_core::{
    Cleaner, CleaningTask, Discrepancy, LegalDates, Month, WindowBound, parse_iso_date,
};
use turnover_service::{
    AssignmentService, CleanerAdmin, CleanerDirectory, CleanerUpdate, FairDistributionRunner,
    Listing, ReconciliationSyncer, RelocationService, list_month, send_assignment_notice,
    send_monthly_schedules,
};

use crate::app::App;

#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn task_line(t: &CleaningTask) -> String {
    let cleaner = t.cleaner_name.as_deref().unwrap_or("(unassigned)");
    let moved = if t.relocated {
        format!("  moved from {}", t.original_checkout_date)
    } else {
        String::new()
    };
    format!(
        "{}  {:<28}  {:<20}  {}{}",
        t.current_cleaning_date, t.id, t.guest_name, cleaner, moved
    )
}

fn describe_discrepancy(d: &Discrepancy) -> String {
    match d {
        Discrepancy::BookingCancelled { task_id, booking_id } => {
            format!("{task_id}: booking {booking_id} was cancelled")
        }
        Discrepancy::CleaningNoLongerRequired { task_id, booking_id } => {
            format!("{task_id}: booking {booking_id} no longer needs cleaning")
        }
        Discrepancy::CheckoutMoved {
            stale_task_id,
            booking_id,
            current_task_id,
        } => format!("{stale_task_id}: checkout of {booking_id} moved, now {current_task_id}"),
    }
}

pub async fn sync(app: &App, out: Output) -> Result<()> {
    let bookings = app.bookings().await?;
    let store = app.task_store().await?;
    let report = ReconciliationSyncer::new(store)
        .sync(&bookings)
        .await
        .context("sync cleaning tasks")?;

    if out.json {
        return out.print_json(&report);
    }
    println!("{}", report.summary());
    for id in &report.created {
        println!("  + {id}");
    }
    for f in &report.failed {
        let hint = if f.retryable { " (retry later)" } else { "" };
        println!("  ! {}: {}{hint}", f.task_id, f.error);
    }
    if !report.discrepancies.is_empty() {
        println!("\nNeeds review (left in place):");
        for d in &report.discrepancies {
            println!("  ? {}", describe_discrepancy(d));
        }
    }
    Ok(())
}

/// Never fails: a store that cannot even be opened lists as degraded.
async fn month_listing(app: &App, month: Month) -> Listing {
    match app.task_store().await {
        Ok(store) => list_month(store.as_ref(), month).await,
        Err(e) => {
            let msg = format!("{e:#}");
            warn!(%month, error = %msg, "task store unreadable, listing nothing");
            Listing::degraded(msg)
        }
    }
}

pub async fn list(app: &App, out: Output, month: Month) -> Result<()> {
    let listing = month_listing(app, month).await;

    if out.json {
        return out.print_json(&listing);
    }
    if let Some(err) = &listing.error {
        eprintln!("warning: could not read tasks: {err}");
    }
    println!("# Cleanings for {month} ({})\n", listing.tasks.len());
    for t in &listing.tasks {
        println!("{}", task_line(t));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LegalDatesView<'a> {
    task_id: &'a str,
    anchor: NaiveDate,
    window_end: NaiveDate,
    bounded_by: Option<&'a str>,
    draggable: bool,
    dates: Vec<NaiveDate>,
}

impl<'a> LegalDatesView<'a> {
    fn new(task_id: &'a str, legal: &'a LegalDates) -> Self {
        let bounded_by = match &legal.bound {
            WindowBound::NextCheckIn { booking_id, .. } => Some(booking_id.as_str()),
            WindowBound::Horizon(_) => None,
        };
        Self {
            task_id,
            anchor: legal.anchor,
            window_end: legal.bound.date(),
            bounded_by,
            draggable: legal.is_draggable(),
            dates: legal.dates().collect(),
        }
    }
}

pub async fn legal_dates(app: &App, out: Output, task_id: &str) -> Result<()> {
    let bookings = app.bookings().await?;
    let store = app.task_store().await?;
    let legal = RelocationService::new(store, app.relocation_policy())
        .legal_dates(task_id, &bookings)
        .await?;

    let view = LegalDatesView::new(task_id, &legal);
    if out.json {
        return out.print_json(&view);
    }
    match view.bounded_by {
        Some(b) => println!("{task_id}: window ends {} (check-in of {b})", view.window_end),
        None => println!("{task_id}: window ends {} (horizon)", view.window_end),
    }
    if !view.draggable {
        println!("fixed in place on {}", view.anchor);
        return Ok(());
    }
    for d in &view.dates {
        let tag = if *d == view.anchor { "  (checkout)" } else { "" };
        println!("  {d}{tag}");
    }
    Ok(())
}

pub async fn relocate(app: &App, out: Output, task_id: &str, to: &str) -> Result<()> {
    let target = parse_iso_date(to)?;
    let bookings = app.bookings().await?;
    let store = app.task_store().await?;
    let task = RelocationService::new(store, app.relocation_policy())
        .relocate(task_id, target, &bookings)
        .await?;
    print_task(out, &task)
}

pub async fn revert(app: &App, out: Output, task_id: &str) -> Result<()> {
    let bookings = app.bookings().await?;
    let store = app.task_store().await?;
    let task = RelocationService::new(store, app.relocation_policy())
        .revert(task_id, &bookings)
        .await?;
    print_task(out, &task)
}

fn print_task(out: Output, task: &CleaningTask) -> Result<()> {
    if out.json {
        return out.print_json(&task);
    }
    println!("{}", task_line(task));
    Ok(())
}

pub async fn assign(
    app: &App,
    out: Output,
    task_id: &str,
    cleaner_id: &str,
    notify: bool,
) -> Result<()> {
    let bookings = app.bookings().await?;
    let store = app.task_store().await?;
    let roster = app.roster().await?;
    let task = AssignmentService::new(store, roster.clone())
        .assign(task_id, cleaner_id, &bookings)
        .await?;

    if notify {
        // Delivery never undoes the assignment; the outcome is only logged.
        if let Some(cleaner) = roster.get_cleaner(cleaner_id).await? {
            send_assignment_notice(app.notifier().as_ref(), &cleaner, &task).await;
        }
    }
    print_task(out, &task)
}

pub async fn unassign(app: &App, out: Output, task_id: &str) -> Result<()> {
    let bookings = app.bookings().await?;
    let store = app.task_store().await?;
    let roster = app.roster().await?;
    let task = AssignmentService::new(store, roster)
        .unassign(task_id, &bookings)
        .await?;
    print_task(out, &task)
}

pub async fn distribute(app: &App, out: Output, month: Month, notify: bool) -> Result<()> {
    let bookings = app.bookings().await?;
    let store = app.task_store().await?;
    let roster = app.roster().await?;
    let report = FairDistributionRunner::new(store.clone(), roster.clone(), roster.clone())
        .run(month, &bookings)
        .await
        .with_context(|| format!("distribute {month}"))?;

    let notified = if notify && !report.persisted.is_empty() {
        let recipients: BTreeSet<String> =
            report.persisted.iter().map(|a| a.cleaner_id.clone()).collect();
        let cleaners = roster.list_cleaners().await?;
        let sent = send_monthly_schedules(
            app.notifier().as_ref(),
            store.as_ref(),
            &cleaners,
            month,
            &recipients,
        )
        .await?;
        info!(sent = sent.sent.len(), failed = sent.failed.len(), "monthly schedules sent");
        Some(sent)
    } else {
        None
    };

    if out.json {
        #[derive(Serialize)]
        struct View<'a> {
            distribution: &'a turnover_service::DistributionReport,
            notifications: Option<&'a turnover_service::NotifyReport>,
        }
        return out.print_json(&View {
            distribution: &report,
            notifications: notified.as_ref(),
        });
    }

    println!("{}", report.summary());
    for a in &report.persisted {
        println!("  {}  {:<28}  {}", a.date, a.task_id, a.cleaner_name);
    }
    for s in &report.plan.skipped {
        println!("  {}  {:<28}  (nobody available)", s.date, s.task_id);
    }
    for f in &report.failed {
        println!("  ! {}: {}", f.task_id, f.error);
    }
    if !report.plan.load_after.is_empty() {
        println!("\nLoad:");
        for (cleaner, n) in &report.plan.load_after {
            println!("  {cleaner:<20} {n}");
        }
    }
    if let Some(n) = notified {
        println!(
            "\nNotified {}, no LINE id {}, failed {}",
            n.sent.len(),
            n.skipped.len(),
            n.failed.len()
        );
    }
    Ok(())
}

pub async fn link_issue(app: &App, out: Output, cleaner_id: &str, month: Month) -> Result<()> {
    let links = app.links().await?;
    let link = links.issue(cleaner_id, month, Utc::now()).await?;
    if out.json {
        return out.print_json(&link);
    }
    println!("{}", link.url);
    println!("expires {}", link.expires_at.format("%Y-%m-%d %H:%M UTC"));
    Ok(())
}

pub async fn link_verify(app: &App, out: Output, token: &str) -> Result<()> {
    let links = app.links().await?;
    let claims = links.verify(token, Utc::now())?;
    if out.json {
        return out.print_json(&claims);
    }
    println!(
        "cleaner {} / {} / expires {}",
        claims.cleaner_id,
        claims.month,
        claims.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}

pub async fn availability_submit(
    app: &App,
    out: Output,
    token: &str,
    dates: &[String],
) -> Result<()> {
    if dates.iter().all(|d| d.trim().is_empty()) {
        bail!("--dates needs at least one YYYY-MM-DD date");
    }
    let links = app.links().await?;
    let availability = links.submit(token, dates, Utc::now()).await?;
    if out.json {
        return out.print_json(&availability);
    }
    println!(
        "{}: {} date(s) recorded for {}",
        availability.cleaner_id,
        availability.available_dates.len(),
        availability.month
    );
    Ok(())
}

async fn cleaner_admin(app: &App) -> Result<CleanerAdmin> {
    Ok(CleanerAdmin::new(app.roster().await?, app.task_store().await?))
}

fn cleaner_line(c: &Cleaner) -> String {
    let line = c.line_user_id.as_deref().unwrap_or("-");
    let state = if c.is_active { "" } else { "  (inactive)" };
    format!("{:<12}  {:<20}  LINE {line}{state}", c.id, c.name)
}

fn print_cleaner(out: Output, cleaner: &Cleaner) -> Result<()> {
    if out.json {
        return out.print_json(cleaner);
    }
    println!("{}", cleaner_line(cleaner));
    Ok(())
}

pub async fn cleaner_add(
    app: &App,
    out: Output,
    id: &str,
    name: &str,
    line_user_id: Option<&str>,
) -> Result<()> {
    let cleaner = cleaner_admin(app).await?.add(id, name, line_user_id).await?;
    print_cleaner(out, &cleaner)
}

pub async fn cleaner_update(app: &App, out: Output, id: &str, edit: &CleanerUpdate) -> Result<()> {
    if edit == &CleanerUpdate::default() {
        bail!("nothing to change; pass --name, --line-user, --clear-line-user or --active");
    }
    let cleaner = cleaner_admin(app).await?.update(id, edit).await?;
    print_cleaner(out, &cleaner)
}

pub async fn cleaner_deactivate(app: &App, out: Output, id: &str) -> Result<()> {
    let cleaner = cleaner_admin(app)
        .await?
        .deactivate(id, app.today())
        .await
        .with_context(|| format!("deactivate {id}"))?;
    print_cleaner(out, &cleaner)
}

pub async fn cleaner_list(app: &App, out: Output, include_inactive: bool) -> Result<()> {
    let cleaners = cleaner_admin(app).await?.list(include_inactive).await?;
    if out.json {
        return out.print_json(&cleaners);
    }
    for c in &cleaners {
        println!("{}", cleaner_line(c));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use turnover_service::{TaskQuery, TaskStore};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn csv_home(rows: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.toml"),
            "[bookings]\nsource = \"csv\"\ncsv_path = \"bookings.csv\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("bookings.csv"),
            format!("id,guest_name,check_in,check_out,status,cleaning_required\n{rows}"),
        )
        .unwrap();
        dir
    }

    const QUIET: Output = Output { json: false };

    #[tokio::test]
    async fn sync_then_relocate_within_the_window() {
        let home = csv_home(
            "b1,Sato,2025-08-07,2025-08-10,accepted,true\n\
             b2,Kim,2025-08-14,2025-08-16,accepted,true\n",
        );
        let app = App::load(Some(home.path())).unwrap();

        sync(&app, QUIET).await.unwrap();
        let store = app.task_store().await.unwrap();
        let all = store
            .query(&TaskQuery::CleaningDateBetween(Month::new(2025, 8).unwrap().range()))
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        relocate(&app, QUIET, "2025-08-10_b1", "2025-08-13").await.unwrap();
        let moved = app.task_store().await.unwrap().get("2025-08-10_b1").await.unwrap().unwrap();
        assert_eq!(moved.current_cleaning_date, d("2025-08-13"));
        assert!(moved.relocated);

        // Past the next check-in.
        assert!(relocate(&app, QUIET, "2025-08-10_b1", "2025-08-15").await.is_err());

        revert(&app, QUIET, "2025-08-10_b1").await.unwrap();
        let back = app.task_store().await.unwrap().get("2025-08-10_b1").await.unwrap().unwrap();
        assert_eq!(back.current_cleaning_date, d("2025-08-10"));
        assert!(!back.relocated);
    }

    #[tokio::test]
    async fn listing_an_empty_home_is_not_an_error() {
        let home = csv_home("");
        let app = App::load(Some(home.path())).unwrap();
        list(&app, QUIET, Month::new(2025, 8).unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_tasks_file_lists_as_degraded() {
        let home = csv_home("");
        fs::write(home.path().join("tasks.json"), "{ not json").unwrap();
        let app = App::load(Some(home.path())).unwrap();
        let aug = Month::new(2025, 8).unwrap();

        let listing = month_listing(&app, aug).await;
        assert!(listing.is_degraded());
        assert!(listing.tasks.is_empty());
        list(&app, QUIET, aug).await.unwrap();
    }

    #[tokio::test]
    async fn cleaner_roster_round_trip_through_commands() {
        let home = csv_home("");
        let app = App::load(Some(home.path())).unwrap();

        cleaner_add(&app, QUIET, "c1", "Aiko", None).await.unwrap();
        assert!(cleaner_add(&app, QUIET, "c1", "Aiko", None).await.is_err());
        cleaner_update(
            &app,
            QUIET,
            "c1",
            &CleanerUpdate {
                line_user_id: Some(Some("U1".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(cleaner_update(&app, QUIET, "c1", &CleanerUpdate::default()).await.is_err());

        let roster = app.roster().await.unwrap();
        let c1 = roster.get_cleaner("c1").await.unwrap().unwrap();
        assert_eq!(c1.line_user_id.as_deref(), Some("U1"));

        cleaner_deactivate(&app, QUIET, "c1").await.unwrap();
        let c1 = app.roster().await.unwrap().get_cleaner("c1").await.unwrap().unwrap();
        assert!(!c1.is_active);
        cleaner_list(&app, QUIET, true).await.unwrap();
    }

    #[test]
    fn legal_dates_view_names_the_bounding_booking() {
        let bookings = vec![
            turnover_core::Booking::new("x", d("2025-08-07"), d("2025-08-10"), "X"),
            turnover_core::Booking::new("y", d("2025-08-12"), d("2025-08-15"), "Y"),
        ];
        let task = turnover_core::derive_task(&bookings[0]).unwrap();
        let legal = turnover_core::RelocationValidator::new(
            &bookings,
            turnover_core::RelocationPolicy::default(),
        )
        .legal_dates(&task);

        let view = LegalDatesView::new(&task.id, &legal);
        assert_eq!(view.bounded_by, Some("y"));
        assert_eq!(view.window_end, d("2025-08-12"));
        assert_eq!(view.dates, vec![d("2025-08-10"), d("2025-08-11"), d("2025-08-12")]);
        assert!(view.draggable);
    }
}
