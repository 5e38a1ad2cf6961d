// src/services/timetable_service.rs
use crate::{
    error::{AppError, AppResult},
    models::timetable::{
        hhmm, ClassSlot, ClassSlotRow, Day, EnrollmentError, StoredTimetable, Timetable, TimetableRow,
        TimetableSpec,
    },
    services::{slot_grid::SlotGrid, timetable_engine},
};
use chrono::{NaiveDate, NaiveTime};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Gera e guarda um horário. Docentes e salas já ocupados noutros horários
/// com datas sobrepostas contam como reservados. Leitura das reservas e gravação
/// correm na mesma transação `BEGIN IMMEDIATE`, por isso dois pedidos simultâneos
/// não reservam o mesmo docente ou sala.
pub async fn generate_and_save(
    db_pool: &SqlitePool,
    grid: &SlotGrid,
    spec: TimetableSpec,
    created_by: &str,
) -> AppResult<StoredTimetable> {
    let spec = spec.normalized();

    let mut tx = db_pool.begin_with("BEGIN IMMEDIATE").await?;
    let reserved = reserved_slots(&mut tx, spec.start_date, spec.end_date).await?;
    // Inviável: a transação cai no drop (rollback), nada fica gravado
    let timetable = timetable_engine::generate_with_reservations(&spec, grid, &reserved)?;
    let stored = insert_timetable(&mut tx, timetable, created_by).await?;
    tx.commit().await?;

    tracing::info!(
        "Horário '{}' guardado como {} ({} aulas)",
        stored.timetable.spec.name,
        stored.id,
        stored.timetable.classes.len()
    );
    Ok(stored)
}

/// Aulas de todos os horários cujo período se sobrepõe a [start, end].
pub async fn reserved_slots(conn: &mut SqliteConnection, start: NaiveDate, end: NaiveDate) -> AppResult<Vec<ClassSlot>> {
    let rows = sqlx::query_as::<_, ClassSlotRow>(
        r#"
        SELECT s.course_code, s.day, s.start_time, s.end_time, s.subject, s.faculty, s.room, s.capacity
        FROM class_slots s
        JOIN timetables t ON t.id = s.timetable_id
        WHERE t.start_date <= ?2 AND t.end_date >= ?1
        ORDER BY s.timetable_id, s.position
        "#,
    )
    .bind(start.to_string())
    .bind(end.to_string())
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter()
        .map(|row| slot_from_row(row, BTreeSet::new()))
        .collect()
}

/// Insere o horário e as aulas na transação recebida (o commit é de quem chama).
async fn insert_timetable(conn: &mut SqliteConnection, timetable: Timetable, created_by: &str) -> AppResult<StoredTimetable> {
    let id = Uuid::new_v4().to_string();
    let spec = &timetable.spec;
    let spec_json = serde_json::to_string(spec).map_err(|e| {
        tracing::error!("Falha ao serializar pedido de horário: {}", e);
        AppError::InternalServerError
    })?;

    sqlx::query(
        r#"
        INSERT INTO timetables (id, name, department, semester, academic_year, start_date, end_date, spec_json, created_by)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&id)
    .bind(&spec.name)
    .bind(&spec.department)
    .bind(&spec.semester)
    .bind(&spec.academic_year)
    .bind(spec.start_date.to_string())
    .bind(spec.end_date.to_string())
    .bind(&spec_json)
    .bind(created_by)
    .execute(&mut *conn)
    .await?;

    for (position, slot) in timetable.classes.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO class_slots (timetable_id, course_code, position, day, start_time, end_time, subject, faculty, room, capacity)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&id)
        .bind(&slot.course_code)
        .bind(position as i64)
        .bind(slot.day.as_str())
        .bind(slot.start_time.format(hhmm::FORMAT).to_string())
        .bind(slot.end_time.format(hhmm::FORMAT).to_string())
        .bind(&slot.subject)
        .bind(&slot.faculty)
        .bind(&slot.room)
        .bind(i64::from(slot.capacity))
        .execute(&mut *conn)
        .await?;

        for student in &slot.enrolled_students {
            sqlx::query("INSERT INTO enrollments (timetable_id, course_code, student_id) VALUES (?1, ?2, ?3)")
                .bind(&id)
                .bind(&slot.course_code)
                .bind(student)
                .execute(&mut *conn)
                .await?;
        }
    }

    tracing::debug!("Horário {} inserido ({} aulas), à espera do commit", id, timetable.classes.len());

    Ok(StoredTimetable {
        id,
        created_by: created_by.to_string(),
        timetable,
    })
}

pub async fn list(db_pool: &SqlitePool) -> AppResult<Vec<TimetableRow>> {
    let rows = sqlx::query_as::<_, TimetableRow>(
        r#"
        SELECT id, name, department, semester, academic_year, start_date, end_date, created_by, created_at
        FROM timetables
        ORDER BY created_at DESC, name ASC
        "#,
    )
    .fetch_all(db_pool)
    .await?;
    Ok(rows)
}

pub async fn find(db_pool: &SqlitePool, id: &str) -> AppResult<Option<StoredTimetable>> {
    let header: Option<(String, String)> =
        sqlx::query_as("SELECT spec_json, created_by FROM timetables WHERE id = ?1")
            .bind(id)
            .fetch_optional(db_pool)
            .await?;
    let Some((spec_json, created_by)) = header else {
        return Ok(None);
    };

    let spec: TimetableSpec = serde_json::from_str(&spec_json).map_err(|e| {
        tracing::error!("spec_json corrompido no horário {}: {}", id, e);
        AppError::InternalServerError
    })?;

    let rows = sqlx::query_as::<_, ClassSlotRow>(
        r#"
        SELECT course_code, day, start_time, end_time, subject, faculty, room, capacity
        FROM class_slots
        WHERE timetable_id = ?1
        ORDER BY position ASC
        "#,
    )
    .bind(id)
    .fetch_all(db_pool)
    .await?;

    let enrollments: Vec<(String, String)> = sqlx::query_as(
        "SELECT course_code, student_id FROM enrollments WHERE timetable_id = ?1 ORDER BY student_id",
    )
    .bind(id)
    .fetch_all(db_pool)
    .await?;

    let mut classes = Vec::with_capacity(rows.len());
    for row in rows {
        let students = enrollments
            .iter()
            .filter(|(code, _)| *code == row.course_code)
            .map(|(_, student)| student.clone())
            .collect();
        classes.push(slot_from_row(row, students)?);
    }

    Ok(Some(StoredTimetable {
        id: id.to_string(),
        created_by,
        timetable: Timetable { spec, classes },
    }))
}

/// Apaga o horário; aulas e inscrições vão atrás (ON DELETE CASCADE).
pub async fn delete(db_pool: &SqlitePool, id: &str) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM timetables WHERE id = ?1")
        .bind(id)
        .execute(db_pool)
        .await?;
    let deleted = result.rows_affected() > 0;
    if deleted {
        tracing::info!("Horário {} apagado.", id);
    }
    Ok(deleted)
}

/// Inscreve um aluno numa aula. `Ok(false)` se já estava inscrito.
pub async fn enroll(db_pool: &SqlitePool, timetable_id: &str, course_code: &str, student_id: &str) -> AppResult<bool> {
    let mut stored = find(db_pool, timetable_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Horário {}", timetable_id)))?;

    if !stored.timetable.enroll(course_code, student_id)? {
        return Ok(false);
    }

    if !insert_enrollment(db_pool, timetable_id, course_code, student_id).await? {
        return Ok(false);
    }
    tracing::info!("Aluno {} inscrito em {} ({})", student_id, course_code, timetable_id);
    Ok(true)
}

/// INSERT com a contagem dentro da própria instrução, para não ultrapassar a capacidade
/// em pedidos simultâneos. `Ok(false)` se o aluno já lá estava (ex.: perdeu a corrida
/// para um pedido igual); `CapacityReached` só quando a aula está mesmo cheia.
async fn insert_enrollment(
    db_pool: &SqlitePool,
    timetable_id: &str,
    course_code: &str,
    student_id: &str,
) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO enrollments (timetable_id, course_code, student_id)
        SELECT ?1, ?2, ?3
        WHERE (SELECT COUNT(*) FROM enrollments WHERE timetable_id = ?1 AND course_code = ?2)
            < (SELECT capacity FROM class_slots WHERE timetable_id = ?1 AND course_code = ?2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(timetable_id)
    .bind(course_code)
    .bind(student_id)
    .execute(db_pool)
    .await?;

    if result.rows_affected() > 0 {
        return Ok(true);
    }

    let already: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM enrollments WHERE timetable_id = ?1 AND course_code = ?2 AND student_id = ?3",
    )
    .bind(timetable_id)
    .bind(course_code)
    .bind(student_id)
    .fetch_optional(db_pool)
    .await?;
    if already.is_some() {
        return Ok(false);
    }

    let capacity: Option<i64> =
        sqlx::query_scalar("SELECT capacity FROM class_slots WHERE timetable_id = ?1 AND course_code = ?2")
            .bind(timetable_id)
            .bind(course_code)
            .fetch_optional(db_pool)
            .await?;
    match capacity {
        Some(capacity) => Err(EnrollmentError::CapacityReached {
            course_code: course_code.to_string(),
            capacity: u32::try_from(capacity).unwrap_or_default(),
        }
        .into()),
        None => Err(EnrollmentError::UnknownClass(course_code.to_string()).into()),
    }
}

fn slot_from_row(row: ClassSlotRow, enrolled_students: BTreeSet<String>) -> AppResult<ClassSlot> {
    let corrupt = |what: &str| {
        tracing::error!("Aula {} com {} inválido na DB", row.course_code, what);
        AppError::InternalServerError
    };
    let day = Day::parse(&row.day).ok_or_else(|| corrupt("dia"))?;
    let start_time = NaiveTime::parse_from_str(&row.start_time, hhmm::FORMAT).map_err(|_| corrupt("início"))?;
    let end_time = NaiveTime::parse_from_str(&row.end_time, hhmm::FORMAT).map_err(|_| corrupt("fim"))?;
    let capacity = u32::try_from(row.capacity).map_err(|_| corrupt("capacidade"))?;

    Ok(ClassSlot {
        day,
        start_time,
        end_time,
        subject: row.subject,
        course_code: row.course_code,
        faculty: row.faculty,
        room: row.room,
        capacity,
        enrolled_students,
    })
}
