use fieldsync_core::store::LocalStore;

use crate::commands::common::{open_database, Context};
use crate::error::CliError;

pub async fn run_projects(ctx: &Context, work_types: bool, as_json: bool) -> Result<(), CliError> {
    let db = open_database(&ctx.db_path).await?;

    if work_types {
        let work_types = db.list_work_types().await?;
        if as_json {
            println!("{}", serde_json::to_string_pretty(&work_types)?);
        } else if work_types.is_empty() {
            println!("No work types downloaded yet. Run `fieldsync sync --download-only`.");
        } else {
            for work_type in &work_types {
                println!("{:>6}  {}", work_type.id, work_type.name);
            }
        }
        return Ok(());
    }

    let projects = db.list_projects().await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
    } else if projects.is_empty() {
        println!("No projects downloaded yet. Run `fieldsync sync --download-only`.");
    } else {
        for project in &projects {
            match &project.client {
                Some(client) => println!("{:>6}  {} ({client})", project.id, project.name),
                None => println!("{:>6}  {}", project.id, project.name),
            }
        }
    }
    Ok(())
}
