// src/services/slot_grid.rs
//! Grelha semanal de células (dia, janela horária) onde o motor coloca aulas.

use crate::models::timetable::{Day, TimeWindow, TimetableConstraints};
use chrono::NaiveTime;

/// Janelas usadas quando a configuração não define outras.
pub const STANDARD_WINDOWS: [(u32, u32, u32, u32); 4] = [
    (9, 0, 10, 30),
    (11, 0, 12, 30),
    (14, 0, 15, 30),
    (16, 0, 17, 30),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub day: Day,
    pub window: TimeWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotGrid {
    days: Vec<Day>,
    windows: Vec<TimeWindow>,
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self::standard()
    }
}

impl SlotGrid {
    /// Segunda a sexta com as quatro janelas padrão.
    pub fn standard() -> Self {
        let windows = STANDARD_WINDOWS
            .iter()
            .filter_map(|&(sh, sm, eh, em)| {
                Some(TimeWindow::new(
                    NaiveTime::from_hms_opt(sh, sm, 0)?,
                    NaiveTime::from_hms_opt(eh, em, 0)?,
                ))
            })
            .collect();
        Self::new(Day::ALL.to_vec(), windows)
    }

    /// Dias e janelas são ordenados e deduplicados; a ordem de entrada não importa.
    pub fn new(mut days: Vec<Day>, mut windows: Vec<TimeWindow>) -> Self {
        days.sort();
        days.dedup();
        windows.sort();
        windows.dedup();
        Self { days, windows }
    }

    /// Lê "09:00-10:30,11:00-12:30". `None` se alguma janela for inválida.
    pub fn from_window_list(raw: &str) -> Option<Self> {
        let windows = raw
            .split(',')
            .filter(|w| !w.trim().is_empty())
            .map(TimeWindow::parse)
            .collect::<Option<Vec<_>>>()?;
        if windows.is_empty() {
            return None;
        }
        Some(Self::new(Day::ALL.to_vec(), windows))
    }

    pub fn days(&self) -> &[Day] {
        &self.days
    }

    pub fn windows(&self) -> &[TimeWindow] {
        &self.windows
    }

    /// Células disponíveis, dia a dia e depois por hora. Janelas que tocam o almoço ficam de fora.
    pub fn cells(&self, constraints: &TimetableConstraints) -> Vec<Cell> {
        let lunch = constraints.lunch_window;
        self.days
            .iter()
            .flat_map(|&day| {
                self.windows
                    .iter()
                    .filter(move |w| !w.overlaps(&lunch))
                    .map(move |&window| Cell { day, window })
            })
            .collect()
    }

    /// Limite superior de aulas que cabem nesta grelha com estes limites.
    pub fn capacity(&self, constraints: &TimetableConstraints) -> usize {
        let per_day = self
            .windows
            .iter()
            .filter(|w| !w.overlaps(&constraints.lunch_window))
            .count()
            .min(constraints.max_classes_per_day as usize);
        per_day * self.days.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn standard_grid_is_day_major_time_minor() {
        let grid = SlotGrid::standard();
        let cells = grid.cells(&TimetableConstraints::default());

        assert_eq!(cells.len(), 20);
        assert_eq!(cells[0].day, Day::Monday);
        assert_eq!(cells[0].window.start, t(9, 0));
        assert_eq!(cells[3].window.start, t(16, 0));
        assert_eq!(cells[4].day, Day::Tuesday);
        assert_eq!(cells[19].day, Day::Friday);
    }

    #[test]
    fn lunch_window_removes_overlapping_cells() {
        let grid = SlotGrid::standard();
        let constraints = TimetableConstraints {
            lunch_window: TimeWindow::new(t(12, 0), t(13, 0)),
            ..TimetableConstraints::default()
        };

        let cells = grid.cells(&constraints);
        assert_eq!(cells.len(), 15);
        assert!(cells.iter().all(|c| c.window.start != t(11, 0)));
        assert_eq!(grid.capacity(&constraints), 15);
    }

    #[test]
    fn capacity_is_capped_by_max_classes_per_day() {
        let grid = SlotGrid::standard();
        let constraints = TimetableConstraints {
            max_classes_per_day: 2,
            ..TimetableConstraints::default()
        };
        assert_eq!(grid.capacity(&constraints), 10);
    }

    #[test]
    fn window_list_is_sorted_and_validated() {
        let grid = SlotGrid::from_window_list("14:00-15:00, 08:00-09:00").unwrap();
        assert_eq!(grid.windows()[0].start, t(8, 0));
        assert_eq!(grid.days().len(), 5);

        assert!(SlotGrid::from_window_list("8h-9h").is_none());
        assert!(SlotGrid::from_window_list("").is_none());
    }
}
