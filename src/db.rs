use std::sync::{Arc, Mutex};

use rusqlite::{Connection, ErrorCode, Result, ToSql};

use crate::error::AppError;
use crate::models::{Priority, Task, TaskSort, UpdateTask, User};

pub type DbPool = Arc<Mutex<Connection>>;

const TASK_COLUMNS: &str =
    "id, title, description, completed, due_date, priority, user_id, created_at, updated_at";

pub fn init_db(path: &str) -> Result<DbPool> {
    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

pub fn init_db_in_memory() -> Result<DbPool> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            created_at INTEGER DEFAULT (strftime('%s', 'now')),
            updated_at INTEGER DEFAULT (strftime('%s', 'now'))
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            completed INTEGER DEFAULT 0,
            due_date TEXT,
            priority TEXT NOT NULL DEFAULT 'media',
            user_id INTEGER NOT NULL REFERENCES users(id),
            created_at INTEGER DEFAULT (strftime('%s', 'now')),
            updated_at INTEGER DEFAULT (strftime('%s', 'now'))
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_owner_created ON tasks(user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_tasks_owner_completed ON tasks(user_id, completed);
        ",
    )
}

/// Optional narrowing of a task listing. An empty `sort` means the default
/// order, creation time descending.
#[derive(Debug, Default)]
pub struct TaskFilter {
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub sort: Vec<TaskSort>,
}

// User operations

pub fn create_user(
    pool: &DbPool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, AppError> {
    let conn = pool.lock().unwrap();
    let inserted = conn.execute(
        "INSERT INTO users (name, email, password_hash) VALUES (?1, ?2, ?3)",
        (name, email, password_hash),
    );

    if let Err(err) = inserted {
        // A colliding email trips the unique constraint and leaves the table
        // untouched; everything else is unexpected.
        if let rusqlite::Error::SqliteFailure(e, _) = &err {
            if e.code == ErrorCode::ConstraintViolation {
                return Err(AppError::Conflict("a user with this email already exists"));
            }
        }
        return Err(err.into());
    }

    let id = conn.last_insert_rowid();
    get_user_internal(&conn, id)?
        .ok_or_else(|| AppError::Internal("user missing after insert".to_string()))
}

pub fn get_user(pool: &DbPool, id: i64) -> Result<Option<User>, AppError> {
    let conn = pool.lock().unwrap();
    get_user_internal(&conn, id)
}

fn get_user_internal(conn: &Connection, id: i64) -> Result<Option<User>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, password_hash, created_at, updated_at FROM users WHERE id = ?1",
    )?;
    let mut rows = stmt.query([id])?;

    if let Some(row) = rows.next()? {
        Ok(Some(user_from_row(row)?))
    } else {
        Ok(None)
    }
}

pub fn find_user_by_email(pool: &DbPool, email: &str) -> Result<Option<User>, AppError> {
    let conn = pool.lock().unwrap();
    let mut stmt = conn.prepare(
        "SELECT id, name, email, password_hash, created_at, updated_at FROM users WHERE email = ?1",
    )?;
    let mut rows = stmt.query([email])?;

    if let Some(row) = rows.next()? {
        Ok(Some(user_from_row(row)?))
    } else {
        Ok(None)
    }
}

fn user_from_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

// Task operations. Every statement filters on the owner as well as the task
// id, so another user's task is indistinguishable from a missing one.

#[allow(clippy::too_many_arguments)]
pub fn create_task(
    pool: &DbPool,
    owner_id: i64,
    title: &str,
    description: Option<&str>,
    completed: bool,
    priority: Priority,
    due_date: Option<&str>,
) -> Result<Task, AppError> {
    let conn = pool.lock().unwrap();
    conn.execute(
        "INSERT INTO tasks (title, description, completed, priority, due_date, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            title,
            description,
            completed as i32,
            priority.as_str(),
            due_date,
            owner_id,
        ),
    )?;
    let id = conn.last_insert_rowid();

    get_task_internal(&conn, id, owner_id)?
        .ok_or_else(|| AppError::Internal("task missing after insert".to_string()))
}

pub fn list_tasks(pool: &DbPool, owner_id: i64, filter: &TaskFilter) -> Result<Vec<Task>, AppError> {
    let conn = pool.lock().unwrap();

    let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1");
    let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(owner_id)];

    if let Some(completed) = filter.completed {
        params.push(Box::new(completed as i32));
        sql.push_str(&format!(" AND completed = ?{}", params.len()));
    }
    if let Some(priority) = filter.priority {
        params.push(Box::new(priority.as_str().to_string()));
        sql.push_str(&format!(" AND priority = ?{}", params.len()));
    }

    sql.push_str(" ORDER BY ");
    if filter.sort.is_empty() {
        sql.push_str("created_at DESC, id DESC");
    } else {
        let order: Vec<String> = filter.sort.iter().map(TaskSort::sql).collect();
        sql.push_str(&order.join(", "));
    }

    let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let tasks = stmt
        .query_map(params_refs.as_slice(), task_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

pub fn get_task(pool: &DbPool, id: i64, owner_id: i64) -> Result<Option<Task>, AppError> {
    let conn = pool.lock().unwrap();
    get_task_internal(&conn, id, owner_id)
}

pub fn update_task(
    pool: &DbPool,
    id: i64,
    owner_id: i64,
    patch: &UpdateTask,
) -> Result<Option<Task>, AppError> {
    let conn = pool.lock().unwrap();

    let mut updates = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(ref title) = patch.title {
        updates.push("title = ?");
        params.push(Box::new(title.clone()));
    }
    if let Some(ref description) = patch.description {
        updates.push("description = ?");
        params.push(Box::new(description.clone()));
    }
    if let Some(completed) = patch.completed {
        updates.push("completed = ?");
        params.push(Box::new(completed as i32));
    }
    if let Some(priority) = patch.priority {
        updates.push("priority = ?");
        params.push(Box::new(priority.as_str().to_string()));
    }
    if let Some(ref due_date) = patch.due_date {
        updates.push("due_date = ?");
        params.push(Box::new(due_date.clone()));
    }

    if updates.is_empty() {
        return get_task_internal(&conn, id, owner_id);
    }

    updates.push("updated_at = strftime('%s', 'now')");
    params.push(Box::new(id));
    params.push(Box::new(owner_id));

    let query = format!(
        "UPDATE tasks SET {} WHERE id = ? AND user_id = ?",
        updates.join(", ")
    );

    let params_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    conn.execute(&query, params_refs.as_slice())?;

    get_task_internal(&conn, id, owner_id)
}

pub fn delete_task(pool: &DbPool, id: i64, owner_id: i64) -> Result<bool, AppError> {
    let conn = pool.lock().unwrap();
    let rows = conn.execute(
        "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
        (id, owner_id),
    )?;
    Ok(rows > 0)
}

fn get_task_internal(conn: &Connection, id: i64, owner_id: i64) -> Result<Option<Task>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND user_id = ?2"
    ))?;
    let mut rows = stmt.query([id, owner_id])?;

    if let Some(row) = rows.next()? {
        Ok(Some(task_from_row(row)?))
    } else {
        Ok(None)
    }
}

fn task_from_row(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let priority: String = row.get(5)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        completed: row.get::<_, i32>(3)? != 0,
        due_date: row.get(4)?,
        priority: Priority::parse(&priority).unwrap_or_default(),
        user_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
