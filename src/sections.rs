use rayon::prelude::*;
use tracing::trace;

use crate::report::Report;

// Below this many sections the rayon fan-out costs more than the match.
const PARALLEL_FILTER_THRESHOLD: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionState {
    Collapsed,
    Expanded,
}

/// One collapsible region: a header labeled with the function name and a
/// content block holding its disassembly. Sections start collapsed.
#[derive(Debug, Clone)]
pub struct Section {
    pub label: String,
    pub body: Option<String>,
    pub state: SectionState,
    pub visible: bool,
}

impl Section {
    pub fn new(label: impl Into<String>, body: Option<String>) -> Self {
        Section {
            label: label.into(),
            body,
            state: SectionState::Collapsed,
            visible: true,
        }
    }

    pub fn is_expanded(&self) -> bool {
        self.state == SectionState::Expanded
    }

    fn matches(&self, needle: &str) -> bool {
        self.label.to_lowercase().contains(needle)
    }
}

/// All sections of the report in report order. Sorting the functions table
/// does not touch this order. Every section toggles independently.
pub struct SectionList {
    sections: Vec<Section>,
    cursor: usize,
}

impl SectionList {
    pub fn new(sections: Vec<Section>) -> Self {
        SectionList {
            sections,
            cursor: 0,
        }
    }

    pub fn from_report(report: &Report) -> Self {
        let sections = report
            .functions
            .iter()
            .map(|f| Section::new(&f.name, f.disassembly.clone()))
            .collect();
        Self::new(sections)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn get(&self, idx: usize) -> Option<&Section> {
        self.sections.get(idx)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Flip one section between collapsed and expanded. Neighbours are not
    /// affected, this is not an accordion.
    pub fn toggle(&mut self, idx: usize) -> Option<SectionState> {
        let section = self.sections.get_mut(idx)?;
        section.state = match section.state {
            SectionState::Collapsed => SectionState::Expanded,
            SectionState::Expanded => SectionState::Collapsed,
        };
        trace!("Section \"{}\" is now {:?}", section.label, section.state);
        Some(section.state)
    }

    pub fn expand(&mut self, idx: usize) {
        if let Some(section) = self.sections.get_mut(idx) {
            section.state = SectionState::Expanded;
        }
    }

    /// Hide sections whose label does not contain `query`, show the rest.
    /// Case insensitive, the empty query shows everything. Expanded state
    /// survives hiding.
    pub fn filter(&mut self, query: &str) {
        let needle = query.to_lowercase();
        if self.sections.len() >= PARALLEL_FILTER_THRESHOLD {
            self.sections
                .par_iter_mut()
                .for_each(|s| s.visible = s.matches(&needle));
        } else {
            for s in self.sections.iter_mut() {
                s.visible = s.matches(&needle);
            }
        }
        self.snap_cursor();
        trace!(
            "Section filter \"{}\" shows {}/{}",
            query,
            self.visible_indices().len(),
            self.sections.len()
        );
    }

    pub fn visible_indices(&self) -> Vec<usize> {
        self.sections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.visible)
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn position_of_label(&self, label: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.label == label)
    }

    pub fn set_cursor(&mut self, idx: usize) {
        if idx < self.sections.len() {
            self.cursor = idx;
        }
    }

    pub fn cursor_up(&mut self, step: usize) {
        let visible = self.visible_indices();
        if let Some(pos) = visible.iter().position(|&idx| idx == self.cursor) {
            self.cursor = visible[pos.saturating_sub(step)];
        }
    }

    pub fn cursor_down(&mut self, step: usize) {
        let visible = self.visible_indices();
        if let Some(pos) = visible.iter().position(|&idx| idx == self.cursor) {
            let target = std::cmp::min(pos + step, visible.len() - 1);
            self.cursor = visible[target];
        }
    }

    pub fn cursor_top(&mut self) {
        if let Some(&first) = self.visible_indices().first() {
            self.cursor = first;
        }
    }

    pub fn cursor_bottom(&mut self) {
        if let Some(&last) = self.visible_indices().last() {
            self.cursor = last;
        }
    }

    // After filtering the cursor may sit on a hidden section. Move it to
    // the nearest visible one below, falling back to the last visible.
    fn snap_cursor(&mut self) {
        if self.sections.get(self.cursor).map(|s| s.visible) == Some(true) {
            return;
        }
        let visible = self.visible_indices();
        match visible.iter().find(|&&idx| idx > self.cursor) {
            Some(&idx) => self.cursor = idx,
            None => self.cursor = visible.last().copied().unwrap_or(0),
        }
    }
}
