//! Reference data repository implementation

use crate::error::Result;
use crate::models::{Project, WorkType};
use rusqlite::{params, Connection};

/// Trait for reference catalog storage operations
pub trait ReferenceRepository {
    /// Replace the whole project catalog
    fn replace_projects(&mut self, projects: &[Project]) -> Result<()>;

    /// Replace the whole work type catalog
    fn replace_work_types(&mut self, work_types: &[WorkType]) -> Result<()>;

    fn list_projects(&self) -> Result<Vec<Project>>;

    fn list_work_types(&self) -> Result<Vec<WorkType>>;
}

/// `SQLite` implementation of `ReferenceRepository`
pub struct SqliteReferenceRepository<'a> {
    conn: &'a mut Connection,
}

impl<'a> SqliteReferenceRepository<'a> {
    /// Create a new repository with the given connection
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }
}

impl ReferenceRepository for SqliteReferenceRepository<'_> {
    fn replace_projects(&mut self, projects: &[Project]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM projects", [])?;
        {
            // Duplicate ids in one payload keep the last occurrence
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO projects (id, name, description, client, status, date_updated)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )?;
            for project in projects {
                stmt.execute(params![
                    project.id,
                    project.name,
                    project.description,
                    project.client,
                    project.status,
                    project.date_updated,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn replace_work_types(&mut self, work_types: &[WorkType]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM work_types", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO work_types (id, name, description, status)
                 VALUES (?, ?, ?, ?)",
            )?;
            for work_type in work_types {
                stmt.execute(params![
                    work_type.id,
                    work_type.name,
                    work_type.description,
                    work_type.status,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, client, status, date_updated
             FROM projects ORDER BY name COLLATE NOCASE ASC, id ASC",
        )?;
        let projects = stmt
            .query_map([], |row| {
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    client: row.get(3)?,
                    status: row.get(4)?,
                    date_updated: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(projects)
    }

    fn list_work_types(&self) -> Result<Vec<WorkType>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, status
             FROM work_types ORDER BY name COLLATE NOCASE ASC, id ASC",
        )?;
        let work_types = stmt
            .query_map([], |row| {
                Ok(WorkType {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    status: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(work_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    fn project(id: i64, name: &str) -> Project {
        Project {
            id,
            name: name.to_string(),
            description: None,
            client: Some("ACME".to_string()),
            status: 1,
            date_updated: None,
        }
    }

    #[test]
    fn test_replace_projects_is_idempotent() {
        let mut db = Database::open_in_memory().unwrap();
        let mut repo = SqliteReferenceRepository::new(db.connection_mut());

        let catalog = vec![project(1, "Bridge"), project(2, "Annex")];
        repo.replace_projects(&catalog).unwrap();
        let first = repo.list_projects().unwrap();
        repo.replace_projects(&catalog).unwrap();
        let second = repo.list_projects().unwrap();

        assert_eq!(first, second);
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].name, "Annex");
    }

    #[test]
    fn test_replace_drops_missing_rows() {
        let mut db = Database::open_in_memory().unwrap();
        let mut repo = SqliteReferenceRepository::new(db.connection_mut());

        repo.replace_work_types(&[
            WorkType {
                id: 1,
                name: "Install".to_string(),
                description: None,
                status: 1,
            },
            WorkType {
                id: 2,
                name: "Repair".to_string(),
                description: None,
                status: 1,
            },
        ])
        .unwrap();
        repo.replace_work_types(&[WorkType {
            id: 2,
            name: "Repair".to_string(),
            description: None,
            status: 1,
        }])
        .unwrap();

        let listed = repo.list_work_types().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, 2);
    }
}
