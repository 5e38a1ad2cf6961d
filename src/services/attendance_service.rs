// src/services/attendance_service.rs
use crate::{
    error::AppResult,
    models::attendance::{AttendanceEvent, AttendanceRow},
};
use chrono::NaiveDate;
use sqlx::SqlitePool;

/// Regista uma presença. UPSERT: uma única linha por (aluno, aula, dia).
pub async fn record(db_pool: &SqlitePool, event: &AttendanceEvent) -> AppResult<AttendanceRow> {
    let date = event.date.format("%Y-%m-%d").to_string();
    tracing::debug!(
        "Marcando {} para aluno {} na aula {} em {} (por {}, {})",
        event.status.as_str(),
        event.student,
        event.class,
        date,
        event.marked_by,
        event.method.as_str()
    );

    let row = sqlx::query_as::<_, AttendanceRow>(
        r#"
        INSERT INTO attendance (student_id, class_id, date, status, marked_by, method, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
        ON CONFLICT(student_id, class_id, date) DO UPDATE SET
           status = excluded.status,
           marked_by = excluded.marked_by,
           method = excluded.method,
           updated_at = excluded.updated_at
        RETURNING student_id, class_id, date, status, marked_by, method, updated_at
        "#,
    )
    .bind(&event.student)
    .bind(&event.class)
    .bind(&date)
    .bind(event.status.as_str())
    .bind(&event.marked_by)
    .bind(event.method.as_str())
    .fetch_one(db_pool)
    .await?;

    Ok(row)
}

/// Histórico de um aluno, mais recente primeiro.
pub async fn list_for_student(db_pool: &SqlitePool, student_id: &str) -> AppResult<Vec<AttendanceRow>> {
    let rows = sqlx::query_as::<_, AttendanceRow>(
        r#"
        SELECT student_id, class_id, date, status, marked_by, method, updated_at
        FROM attendance
        WHERE student_id = ?1
        ORDER BY date DESC, class_id ASC
        "#,
    )
    .bind(student_id)
    .fetch_all(db_pool)
    .await?;
    tracing::debug!("{} registos de presença para {}", rows.len(), student_id);
    Ok(rows)
}

/// Presenças de uma aula, opcionalmente só de um dia.
pub async fn list_for_class(
    db_pool: &SqlitePool,
    class_id: &str,
    date: Option<NaiveDate>,
) -> AppResult<Vec<AttendanceRow>> {
    let date = date.map(|d| d.format("%Y-%m-%d").to_string());
    let rows = sqlx::query_as::<_, AttendanceRow>(
        r#"
        SELECT student_id, class_id, date, status, marked_by, method, updated_at
        FROM attendance
        WHERE class_id = ?1 AND (?2 IS NULL OR date = ?2)
        ORDER BY date DESC, student_id ASC
        "#,
    )
    .bind(class_id)
    .bind(date)
    .fetch_all(db_pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::attendance::{AttendanceStatus, MarkMethod};

    fn event(student: &str, day: u32, status: AttendanceStatus, method: MarkMethod) -> AttendanceEvent {
        AttendanceEvent {
            student: student.into(),
            class: "CS101".into(),
            date: NaiveDate::from_ymd_opt(2024, 10, day).unwrap(),
            status,
            marked_by: "CS001".into(),
            method,
        }
    }

    #[tokio::test]
    async fn same_key_is_updated_not_appended() {
        let pool = db::test_pool().await;

        record(&pool, &event("s1", 1, AttendanceStatus::Absent, MarkMethod::Manual))
            .await
            .unwrap();
        let row = record(&pool, &event("s1", 1, AttendanceStatus::Present, MarkMethod::Qr))
            .await
            .unwrap();

        assert_eq!(row.status, "present");
        assert_eq!(row.method, "qr");
        let rows = list_for_student(&pool, "s1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, "2024-10-01");
    }

    #[tokio::test]
    async fn different_days_and_students_are_separate() {
        let pool = db::test_pool().await;
        record(&pool, &event("s1", 1, AttendanceStatus::Present, MarkMethod::Qr)).await.unwrap();
        record(&pool, &event("s1", 2, AttendanceStatus::Late, MarkMethod::Manual)).await.unwrap();
        record(&pool, &event("s2", 2, AttendanceStatus::Present, MarkMethod::Qr)).await.unwrap();

        let history = list_for_student(&pool, "s1").await.unwrap();
        let dates: Vec<&str> = history.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, ["2024-10-02", "2024-10-01"]);

        let day_two = list_for_class(&pool, "CS101", NaiveDate::from_ymd_opt(2024, 10, 2))
            .await
            .unwrap();
        assert_eq!(day_two.len(), 2);
        assert_eq!(list_for_class(&pool, "CS101", None).await.unwrap().len(), 3);
    }
}
