//! Command-line subcommands and how each one drives the cache

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};

use tasksync::{NewRecord, Patch, Record, RecordId, RemoteGateway, Snapshot, SyncCache};

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// List all tasks
  #[command(alias = "ls")]
  List,
  /// Show one task as the server currently has it
  Show { id: RecordId },
  /// Create a task
  Add {
    title: String,
    #[arg(short, long, default_value = "")]
    description: String,
    /// Create it already completed
    #[arg(long)]
    done: bool,
  },
  /// Change only the given fields of a task
  Edit {
    id: RecordId,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    completed: Option<bool>,
  },
  /// Replace every field of a task
  Replace {
    id: RecordId,
    title: String,
    #[arg(short, long, default_value = "")]
    description: String,
    #[arg(long)]
    done: bool,
  },
  /// Flip a task between pending and completed
  Toggle { id: RecordId },
  /// Delete a task
  #[command(alias = "rm")]
  Remove { id: RecordId },
  /// Count completed and pending tasks
  Stats,
  /// Print the collection every time it changes, until Ctrl-C
  Watch,
}

impl Command {
  /// Whether the command changes server state
  pub fn is_write(&self) -> bool {
    matches!(
      self,
      Command::Add { .. }
        | Command::Edit { .. }
        | Command::Replace { .. }
        | Command::Toggle { .. }
        | Command::Remove { .. }
    )
  }
}

/// Run one command against the cache.
pub async fn run<G: RemoteGateway>(cache: &SyncCache<G>, command: Command) -> Result<()> {
  match command {
    Command::List => {
      let snapshot = cache.refresh().await?;
      print_snapshot(&snapshot);
    }
    Command::Show { id } => {
      let record = cache.get(id).await?;
      println!("{}", format_detail(&record));
    }
    Command::Add {
      title,
      description,
      done,
    } => {
      let record = cache
        .create(NewRecord::new(title, description).completed(done))
        .await?;
      println!("created {}", format_record(&record));
    }
    Command::Edit {
      id,
      title,
      description,
      completed,
    } => {
      let patch = Patch {
        title,
        description,
        completed,
      };
      if patch.is_empty() {
        return Err(eyre!("Nothing to change: pass --title, --description or --completed"));
      }
      let record = cache.partial_update(id, patch).await?;
      println!("updated {}", format_record(&record));
    }
    Command::Replace {
      id,
      title,
      description,
      done,
    } => {
      let patch = Patch::from(NewRecord::new(title, description).completed(done));
      let record = cache.update(id, patch).await?;
      println!("replaced {}", format_record(&record));
    }
    Command::Toggle { id } => {
      // toggle only looks at the cache, so make sure it has been loaded
      cache.refresh().await?;
      let record = cache.toggle(id).await?;
      println!("toggled {}", format_record(&record));
    }
    Command::Remove { id } => {
      cache.remove(id).await?;
      println!("removed {}", id);
    }
    Command::Stats => {
      let snapshot = cache.refresh().await?;
      println!("{}", format_stats(&snapshot));
    }
    Command::Watch => watch(cache).await?,
  }
  Ok(())
}

async fn watch<G: RemoteGateway>(cache: &SyncCache<G>) -> Result<()> {
  let mut snapshots = cache.subscribe();
  loop {
    tokio::select! {
      next = snapshots.next() => match next {
        Some(snapshot) => {
          println!("--- {}", format_stats(&snapshot));
          print_snapshot(&snapshot);
        }
        None => return Ok(()),
      },
      result = tokio::signal::ctrl_c() => {
        result.map_err(|e| eyre!("Failed to listen for Ctrl-C: {}", e))?;
        return Ok(());
      }
    }
  }
}

fn print_snapshot(snapshot: &Snapshot) {
  if snapshot.is_empty() {
    println!("no tasks");
    return;
  }
  for record in snapshot {
    println!("{}", format_record(record));
  }
}

/// One-line form: `[x] 3  Title`
pub fn format_record(record: &Record) -> String {
  let mark = if record.completed { "x" } else { " " };
  format!("[{}] {}  {}", mark, record.id, record.title)
}

fn format_detail(record: &Record) -> String {
  let mut out = format_record(record);
  if !record.description.is_empty() {
    out.push_str("\n    ");
    out.push_str(&record.description);
  }
  out.push_str(&format!(
    "\n    created {}  updated {}",
    record.created_at.format("%Y-%m-%d %H:%M"),
    record.updated_at.format("%Y-%m-%d %H:%M")
  ));
  out
}

pub fn format_stats(snapshot: &Snapshot) -> String {
  format!(
    "{} tasks, {} completed, {} pending",
    snapshot.len(),
    snapshot.completed_count(),
    snapshot.pending_count()
  )
}
