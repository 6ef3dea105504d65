use std::cmp::min;
use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Position, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};

use crate::model::{Model, UIData, ViewKind};

pub const CMDLINE_HEIGHT: usize = 2;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

// Status messages fade after this long.
const STATUS_STALE_AFTER: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct TableUI;

impl TableUI {
    pub fn new() -> Self {
        TableUI
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let area = frame.area();
        let chrome = (CMDLINE_HEIGHT + TABLE_HEADER_HEIGHT) as u16;
        if area.width < 4 || area.height <= chrome {
            return;
        }

        match uidata.view {
            ViewKind::Table => self.draw_table(uidata, frame),
            ViewKind::Sections => self.draw_sections(uidata, frame),
        }
        self.draw_scrollbar(uidata, frame);
        self.draw_statusline(uidata, frame);
        if uidata.show_popup {
            self.draw_popup(uidata, frame);
        }
    }

    fn content_height(&self, uidata: &UIData, area: Rect) -> u16 {
        let chrome = (CMDLINE_HEIGHT + TABLE_HEADER_HEIGHT) as u16;
        min(
            uidata.layout.table_height as u16,
            area.height.saturating_sub(chrome),
        )
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame) {
        let area = frame.area();
        let height = self.content_height(uidata, area);
        let mut x: u16 = 0;

        for (cidx, column) in uidata.table.iter().enumerate() {
            let width = min(column.width as u16, area.width.saturating_sub(x));
            if width == 0 {
                break;
            }

            let mut header_style = Style::new().add_modifier(Modifier::BOLD);
            if cidx == uidata.selected_column {
                header_style = header_style.add_modifier(Modifier::UNDERLINED);
            }
            frame.render_widget(
                Paragraph::new(column.name.clone()).style(header_style),
                Rect::new(x, 0, width, TABLE_HEADER_HEIGHT as u16),
            );

            let lines: Vec<Line> = column
                .data
                .iter()
                .enumerate()
                .map(|(ridx, cell)| {
                    if ridx == uidata.selected_row {
                        Line::styled(
                            cell.clone(),
                            Style::new().add_modifier(Modifier::REVERSED),
                        )
                    } else {
                        Line::raw(cell.clone())
                    }
                })
                .collect();
            frame.render_widget(
                Paragraph::new(lines),
                Rect::new(x, TABLE_HEADER_HEIGHT as u16, width, height),
            );

            x += width + 1;
            if x >= area.width {
                break;
            }
        }
    }

    fn draw_sections(&self, uidata: &UIData, frame: &mut Frame) {
        let area = frame.area();
        let height = self.content_height(uidata, area);

        frame.render_widget(
            Paragraph::new(uidata.name.clone())
                .style(Style::new().add_modifier(Modifier::BOLD)),
            Rect::new(0, 0, area.width, TABLE_HEADER_HEIGHT as u16),
        );

        let lines: Vec<Line> = uidata
            .section_lines
            .iter()
            .map(|line| {
                if line.is_header {
                    let mut style = Style::new().add_modifier(Modifier::BOLD);
                    if line.selected {
                        style = style.add_modifier(Modifier::REVERSED);
                    }
                    let mut spans = vec![Span::styled(line.text.clone(), style)];
                    if line.flash {
                        spans.push(Span::styled(
                            " ✔ copied",
                            Style::new().fg(Color::Green),
                        ));
                    }
                    Line::from(spans)
                } else {
                    Line::styled(line.text.clone(), Style::new().fg(Color::DarkGray))
                }
            })
            .collect();
        frame.render_widget(
            Paragraph::new(lines),
            Rect::new(
                0,
                TABLE_HEADER_HEIGHT as u16,
                area.width.saturating_sub(SCROLLBAR_WIDTH as u16),
                height,
            ),
        );
    }

    fn draw_scrollbar(&self, uidata: &UIData, frame: &mut Frame) {
        if uidata.nrows == 0 {
            return;
        }
        let area = frame.area();
        let height = self.content_height(uidata, area);
        if height == 0 {
            return;
        }
        let rect = Rect::new(
            area.width.saturating_sub(SCROLLBAR_WIDTH as u16),
            TABLE_HEADER_HEIGHT as u16,
            SCROLLBAR_WIDTH as u16,
            height,
        );
        let mut state = ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            rect,
            &mut state,
        );
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame) {
        let area = frame.area();
        let y = area.height.saturating_sub(CMDLINE_HEIGHT as u16);

        let stale = uidata.last_status_message_update.elapsed() > STATUS_STALE_AFTER;
        let style = if stale {
            Style::new().add_modifier(Modifier::DIM)
        } else {
            Style::new().fg(Color::Yellow)
        };
        frame.render_widget(
            Paragraph::new(uidata.status_message.clone()).style(style),
            Rect::new(0, y, area.width, 1),
        );

        if uidata.active_cmdinput {
            let prompt = format!("/{}", uidata.cmdinput.input);
            frame.render_widget(Paragraph::new(prompt), Rect::new(0, y + 1, area.width, 1));
            frame.set_cursor_position(Position::new(
                (1 + uidata.cmdinput.cursor_pos) as u16,
                y + 1,
            ));
        } else {
            let hints = "q quit  Tab view  / filter  s sort  y copy  ? help";
            frame.render_widget(
                Paragraph::new(hints).style(Style::new().add_modifier(Modifier::DIM)),
                Rect::new(0, y + 1, area.width, 1),
            );
        }
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame) {
        let area = frame.area();
        let width = min(64, area.width.saturating_sub(4));
        let height = min(20, area.height.saturating_sub(2));
        if width == 0 || height == 0 {
            return;
        }
        let rect = Rect::new(
            (area.width - width) / 2,
            (area.height - height) / 2,
            width,
            height,
        );
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(uidata.popup_message.clone()).block(Block::bordered().title(" Help ")),
            rect,
        );
    }
}
