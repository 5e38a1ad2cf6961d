// src/models/timetable.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Capacidade usada quando a sala não aparece em `room_capacities`.
pub const DEFAULT_ROOM_CAPACITY: u32 = 60;

// --- Formato "HH:MM" para horas (o serde do chrono espera segundos) ---
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Dias letivos da grelha. A ordem de declaração é a ordem de varrimento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Day {
    pub const ALL: [Day; 5] = [
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
        Day::Friday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
            Day::Friday => "Friday",
        }
    }

    pub fn parse(raw: &str) -> Option<Day> {
        Day::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

/// Intervalo [start, end) dentro de um dia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Lê "09:00-10:30".
    pub fn parse(raw: &str) -> Option<TimeWindow> {
        let (start, end) = raw.trim().split_once('-')?;
        let start = NaiveTime::parse_from_str(start.trim(), hhmm::FORMAT).ok()?;
        let end = NaiveTime::parse_from_str(end.trim(), hhmm::FORMAT).ok()?;
        (start < end).then_some(TimeWindow { start, end })
    }

    /// Intervalos semiabertos: encostar (10:30 / 10:30) não é sobreposição.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

fn default_lunch_window() -> TimeWindow {
    TimeWindow {
        start: NaiveTime::from_hms_opt(12, 30, 0).unwrap_or_default(),
        end: NaiveTime::from_hms_opt(14, 0, 0).unwrap_or_default(),
    }
}

fn default_capacity() -> u32 {
    DEFAULT_ROOM_CAPACITY
}

/// Limites de um horário (o "constraint store").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableConstraints {
    pub max_classes_per_day: u32,
    #[serde(default)]
    pub break_minutes: u32,
    #[serde(default = "default_lunch_window")]
    pub lunch_window: TimeWindow,
    /// Capacidade por sala. Salas ausentes usam `default_capacity`.
    #[serde(default)]
    pub room_capacities: BTreeMap<String, u32>,
    #[serde(default = "default_capacity")]
    pub default_capacity: u32,
}

impl Default for TimetableConstraints {
    fn default() -> Self {
        Self {
            max_classes_per_day: 4,
            break_minutes: 0,
            lunch_window: default_lunch_window(),
            room_capacities: BTreeMap::new(),
            default_capacity: DEFAULT_ROOM_CAPACITY,
        }
    }
}

impl TimetableConstraints {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_classes_per_day == 0 {
            return Err("maxClassesPerDay deve ser maior que zero".into());
        }
        if self.lunch_window.start >= self.lunch_window.end {
            return Err("lunchWindow: início deve ser anterior ao fim".into());
        }
        if self.default_capacity == 0 {
            return Err("defaultCapacity deve ser maior que zero".into());
        }
        if let Some((room, _)) = self.room_capacities.iter().find(|(_, c)| **c == 0) {
            return Err(format!("capacidade da sala '{}' deve ser maior que zero", room));
        }
        Ok(())
    }

    pub fn capacity_of(&self, room: &str) -> u32 {
        self.room_capacities
            .get(room)
            .copied()
            .unwrap_or(self.default_capacity)
    }
}

/// Pedido de geração de horário (JSON em camelCase, como o frontend envia).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableSpec {
    pub name: String,
    pub department: String,
    pub semester: String,
    pub academic_year: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub subjects: Vec<String>,
    #[serde(alias = "faculty")]
    pub faculty_pool: Vec<String>,
    #[serde(alias = "rooms")]
    pub room_pool: Vec<String>,
    pub constraints: TimetableConstraints,
}

impl TimetableSpec {
    /// Remove entradas em branco das listas (o formulário manda uma por linha).
    pub fn normalized(mut self) -> Self {
        fn clean(list: Vec<String>) -> Vec<String> {
            list.into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }
        self.subjects = clean(self.subjects);
        self.faculty_pool = clean(self.faculty_pool);
        self.room_pool = clean(self.room_pool);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.start_date > self.end_date {
            return Err("startDate deve ser anterior ou igual a endDate".into());
        }
        if self.subjects.is_empty() {
            return Err("lista de disciplinas vazia".into());
        }
        if self.faculty_pool.is_empty() {
            return Err("lista de docentes vazia".into());
        }
        if self.room_pool.is_empty() {
            return Err("lista de salas vazia".into());
        }
        self.constraints.validate()
    }
}

/// Uma aula colocada na grelha.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSlot {
    pub day: Day,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub subject: String,
    pub course_code: String,
    pub faculty: String,
    pub room: String,
    pub capacity: u32,
    #[serde(default)]
    pub enrolled_students: BTreeSet<String>,
}

impl ClassSlot {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }

    /// Mesmo dia e horários sobrepostos.
    pub fn collides_with(&self, other: &ClassSlot) -> bool {
        self.day == other.day && self.window().overlaps(&other.window())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnrollmentError {
    #[error("aula '{0}' não existe neste horário")]
    UnknownClass(String),
    #[error("aula '{course_code}' está cheia (capacidade {capacity})")]
    CapacityReached { course_code: String, capacity: u32 },
}

/// Horário gerado: o pedido mais as aulas por ordem de colocação.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timetable {
    #[serde(flatten)]
    pub spec: TimetableSpec,
    pub classes: Vec<ClassSlot>,
}

impl Timetable {
    pub fn class_mut(&mut self, course_code: &str) -> Option<&mut ClassSlot> {
        self.classes.iter_mut().find(|c| c.course_code == course_code)
    }

    /// Inscreve um aluno. Repetir a inscrição não conta duas vezes.
    pub fn enroll(&mut self, course_code: &str, student: &str) -> Result<bool, EnrollmentError> {
        let slot = self
            .class_mut(course_code)
            .ok_or_else(|| EnrollmentError::UnknownClass(course_code.to_string()))?;

        if slot.enrolled_students.contains(student) {
            return Ok(false);
        }
        if slot.enrolled_students.len() >= slot.capacity as usize {
            return Err(EnrollmentError::CapacityReached {
                course_code: slot.course_code.clone(),
                capacity: slot.capacity,
            });
        }
        slot.enrolled_students.insert(student.to_string());
        Ok(true)
    }
}

// --- Linhas da DB ---

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableRow {
    pub id: String,
    pub name: String,
    pub department: String,
    pub semester: String,
    pub academic_year: String,
    pub start_date: String,
    pub end_date: String,
    pub created_by: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ClassSlotRow {
    pub course_code: String,
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub subject: String,
    pub faculty: String,
    pub room: String,
    pub capacity: i64,
}

/// Horário guardado, com o seu ID.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTimetable {
    pub id: String,
    pub created_by: String,
    #[serde(flatten)]
    pub timetable: Timetable,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollPayload {
    pub student_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn slot(code: &str, capacity: u32) -> ClassSlot {
        ClassSlot {
            day: Day::Monday,
            start_time: t(9, 0),
            end_time: t(10, 30),
            subject: "Algoritmos".into(),
            course_code: code.into(),
            faculty: "f0".into(),
            room: "r0".into(),
            capacity,
            enrolled_students: BTreeSet::new(),
        }
    }

    fn spec_json() -> &'static str {
        r#"{
            "name": "CS - Semestre 1",
            "department": "Computer Science",
            "semester": "1",
            "academicYear": "2024-25",
            "startDate": "2024-09-01",
            "endDate": "2024-12-31",
            "subjects": ["Programação", "  ", "Matemática Discreta"],
            "faculty": ["CS001", "CS002"],
            "rooms": ["CS-101"],
            "constraints": { "maxClassesPerDay": 3, "lunchWindow": { "start": "12:00", "end": "13:00" } }
        }"#
    }

    #[test]
    fn spec_accepts_frontend_aliases_and_defaults() {
        let spec: TimetableSpec = serde_json::from_str(spec_json()).unwrap();
        let spec = spec.normalized();

        assert_eq!(spec.subjects, vec!["Programação", "Matemática Discreta"]);
        assert_eq!(spec.faculty_pool, vec!["CS001", "CS002"]);
        assert_eq!(spec.room_pool, vec!["CS-101"]);
        assert_eq!(spec.constraints.break_minutes, 0);
        assert_eq!(spec.constraints.lunch_window, TimeWindow::new(t(12, 0), t(13, 0)));
        assert_eq!(spec.constraints.capacity_of("CS-101"), DEFAULT_ROOM_CAPACITY);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn spec_validation_catches_bad_input() {
        let mut spec: TimetableSpec = serde_json::from_str(spec_json()).unwrap();
        spec.end_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(spec.validate().is_err());

        let mut spec: TimetableSpec = serde_json::from_str(spec_json()).unwrap();
        spec.room_pool = vec!["   ".into()];
        assert!(spec.normalized().validate().is_err());

        let mut spec: TimetableSpec = serde_json::from_str(spec_json()).unwrap();
        spec.constraints.max_classes_per_day = 0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn time_window_overlap_and_parse() {
        let a = TimeWindow::new(t(9, 0), t(10, 30));
        let b = TimeWindow::new(t(10, 30), t(12, 0));
        let c = TimeWindow::new(t(10, 0), t(11, 0));

        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert_eq!(TimeWindow::parse("14:00-15:30"), Some(TimeWindow::new(t(14, 0), t(15, 30))));
        assert_eq!(TimeWindow::parse("15:30-14:00"), None);
    }

    #[test]
    fn enroll_respects_capacity() {
        let spec: TimetableSpec = serde_json::from_str(spec_json()).unwrap();
        let mut timetable = Timetable {
            spec,
            classes: vec![slot("AUTO-1", 2)],
        };

        assert_eq!(timetable.enroll("AUTO-1", "s1"), Ok(true));
        assert_eq!(timetable.enroll("AUTO-1", "s1"), Ok(false));
        assert_eq!(timetable.enroll("AUTO-1", "s2"), Ok(true));
        assert_eq!(
            timetable.enroll("AUTO-1", "s3"),
            Err(EnrollmentError::CapacityReached {
                course_code: "AUTO-1".into(),
                capacity: 2
            })
        );
        assert_eq!(
            timetable.enroll("AUTO-9", "s1"),
            Err(EnrollmentError::UnknownClass("AUTO-9".into()))
        );
    }
}
