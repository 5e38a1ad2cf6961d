// src/services/timetable_engine.rs
//! Motor de atribuição: coloca disciplinas na grelha, em ordem fixa, sem choques.
//!
//! # Algoritmo
//!
//! 1. Percorre as células dia a dia (segunda → sexta) e, dentro do dia, por hora.
//! 2. Em cada célula tenta colocar a próxima disciplina com
//!    `faculty_pool[f % n]` e `room_pool[r % m]`.
//! 3. A célula é rejeitada se o docente ou a sala já ocupam um horário sobreposto
//!    nesse dia (neste horário ou nas reservas externas), ou se o dia já tem
//!    `max_classes_per_day` aulas. `break_minutes` fica guardado no pedido mas
//!    não recusa células.
//!    Rejeitar não consome a disciplina nem avança `f`/`r`.
//! 4. Acaba quando todas estão colocadas ou a grelha esgota. Se sobrar alguma,
//!    devolve `Infeasible` com a contagem; nunca um horário parcial.
//!
//! Função pura: mesma entrada, mesmo resultado.

use crate::models::timetable::{ClassSlot, Day, Timetable, TimetableSpec};
use crate::services::slot_grid::{Cell, SlotGrid};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("pedido de horário inválido: {0}")]
    InvalidSpec(String),
    #[error("impossível colocar {unplaced} de {requested} disciplinas com os limites atuais")]
    Infeasible { unplaced: usize, requested: usize },
}

/// Porque é que uma célula foi recusada (só para logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    DayFull,
    FacultyBusy,
    RoomBusy,
}

pub fn generate(spec: &TimetableSpec, grid: &SlotGrid) -> Result<Timetable, ScheduleError> {
    generate_with_reservations(spec, grid, &[])
}

/// Como `generate`, mas docentes e salas ocupados em `reserved` (outros horários) também contam.
pub fn generate_with_reservations(
    spec: &TimetableSpec,
    grid: &SlotGrid,
    reserved: &[ClassSlot],
) -> Result<Timetable, ScheduleError> {
    spec.validate().map_err(ScheduleError::InvalidSpec)?;

    let constraints = &spec.constraints;
    let requested = spec.subjects.len();
    let mut classes: Vec<ClassSlot> = Vec::with_capacity(requested);
    let mut per_day: BTreeMap<Day, usize> = BTreeMap::new();
    let (mut f, mut r) = (0usize, 0usize);

    tracing::debug!(
        "Gerando horário '{}': {} disciplinas, {} docentes, {} salas, {} reservas externas",
        spec.name,
        requested,
        spec.faculty_pool.len(),
        spec.room_pool.len(),
        reserved.len()
    );

    for cell in grid.cells(constraints) {
        if classes.len() == requested {
            break;
        }

        let faculty = &spec.faculty_pool[f % spec.faculty_pool.len()];
        let room = &spec.room_pool[r % spec.room_pool.len()];

        if let Some(reason) = check_cell(spec, &cell, faculty, room, &classes, reserved, &per_day) {
            tracing::trace!(
                "Célula {} {} recusada para '{}': {:?}",
                cell.day.as_str(),
                cell.window.start,
                spec.subjects[classes.len()],
                reason
            );
            continue;
        }

        let position = classes.len();
        classes.push(ClassSlot {
            day: cell.day,
            start_time: cell.window.start,
            end_time: cell.window.end,
            subject: spec.subjects[position].clone(),
            course_code: format!("AUTO-{}", position + 1),
            faculty: faculty.clone(),
            room: room.clone(),
            capacity: constraints.capacity_of(room),
            enrolled_students: BTreeSet::new(),
        });
        *per_day.entry(cell.day).or_default() += 1;
        f += 1;
        r += 1;
    }

    if classes.len() < requested {
        let unplaced = requested - classes.len();
        tracing::warn!(
            "Horário '{}' inviável: {} de {} disciplinas por colocar",
            spec.name,
            unplaced,
            requested
        );
        return Err(ScheduleError::Infeasible {
            unplaced,
            requested,
        });
    }

    tracing::debug!("Horário '{}' gerado com {} aulas.", spec.name, classes.len());
    Ok(Timetable {
        spec: spec.clone(),
        classes,
    })
}

fn check_cell(
    spec: &TimetableSpec,
    cell: &Cell,
    faculty: &str,
    room: &str,
    placed: &[ClassSlot],
    reserved: &[ClassSlot],
    per_day: &BTreeMap<Day, usize>,
) -> Option<Rejection> {
    let constraints = &spec.constraints;

    if per_day.get(&cell.day).copied().unwrap_or(0) >= constraints.max_classes_per_day as usize {
        return Some(Rejection::DayFull);
    }

    let same_time = |s: &&ClassSlot| s.day == cell.day && s.window().overlaps(&cell.window);
    for slot in placed.iter().chain(reserved).filter(same_time) {
        if slot.faculty == faculty {
            return Some(Rejection::FacultyBusy);
        }
        if slot.room == room {
            return Some(Rejection::RoomBusy);
        }
    }

    None
}
