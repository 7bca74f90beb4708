use crate::db::repository;
use crate::error::FinanceResult;
use crate::models::budget::MonthKey;
use crate::models::category::Category;
use crate::models::transaction::TransactionFilter;
use crate::operations::evaluate::{self, BudgetLine, BudgetStatus};
use crate::operations::summary::{build_summary, Summary};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::{Alignment, Color, Constraint, Direction, Layout, Modifier, Rect, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::io;

const RECENT_ROWS: usize = 10;

#[derive(Debug)]
pub struct DashboardData {
    pub month: MonthKey,
    pub summary: Summary,
    pub lines: Vec<(Category, BudgetLine)>,
}

pub fn build_dashboard(conn: &Connection, month: MonthKey) -> FinanceResult<DashboardData> {
    let transactions = repository::list_transactions(conn, &TransactionFilter::all())?;
    let summary = build_summary(&transactions, RECENT_ROWS)?;
    let lines = evaluate::evaluate(conn, month)?.into_iter().collect();
    Ok(DashboardData { month, summary, lines })
}

/// Leaves raw mode and the alternate screen when dropped, whichever step of
/// the dashboard failed.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> FinanceResult<Self> {
        enable_raw_mode()?;
        let guard = TerminalGuard;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            log::warn!("Failed to disable raw mode: {}", e);
        }
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, LeaveAlternateScreen) {
            log::warn!("Failed to leave alternate screen: {}", e);
        }
    }
}

pub fn run_dashboard(conn: &Connection, month: MonthKey) -> FinanceResult<()> {
    let data = build_dashboard(conn, month)?;

    let _guard = TerminalGuard::enter()?;
    draw_loop(&data)
}

fn draw_loop(data: &DashboardData) -> FinanceResult<()> {
    let backend = ratatui::backend::CrosstermBackend::new(io::stdout());
    let mut terminal = ratatui::Terminal::new(backend)?;

    loop {
        terminal.draw(|frame| {
            let layout = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Percentage(45),
                    Constraint::Min(6),
                ])
                .split(frame.area());

            render_metrics(frame, layout[0], data);
            render_budget_gauges(frame, layout[1], data);

            let bottom = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
                .split(layout[2]);

            render_recent_table(frame, bottom[0], data);
            render_category_spend(frame, bottom[1], data);
        })?;

        if event::poll(std::time::Duration::from_millis(250))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    _ => {}
                },
                _ => {}
            }
        }
    }

    Ok(())
}

fn status_color(line: &BudgetLine) -> Color {
    match line.status {
        BudgetStatus::Exceeded => Color::Red,
        BudgetStatus::AtLimit => Color::LightRed,
        BudgetStatus::Ok if line.is_near_limit() => Color::Yellow,
        BudgetStatus::Ok => Color::Green,
        BudgetStatus::Unbudgeted => Color::DarkGray,
    }
}

fn render_metrics(frame: &mut ratatui::Frame, area: Rect, data: &DashboardData) {
    let bold = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
    let line = Line::from(vec![
        Span::raw("Total spent "),
        Span::styled(data.summary.total_spent.to_string(), bold),
        Span::raw("   Average "),
        Span::styled(data.summary.average.to_string(), bold),
        Span::raw("   Transactions "),
        Span::styled(data.summary.count.to_string(), bold),
        Span::raw("   Categories "),
        Span::styled(data.summary.category_count.to_string(), bold),
    ]);

    let block = Block::default()
        .title("Overview  (press q to exit)")
        .borders(Borders::ALL);
    frame.render_widget(Paragraph::new(line).alignment(Alignment::Center).block(block), area);
}

fn render_budget_gauges(frame: &mut ratatui::Frame, area: Rect, data: &DashboardData) {
    let block = Block::default()
        .title(format!("Budgets for {}", data.month))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let budgeted: Vec<&(Category, BudgetLine)> =
        data.lines.iter().filter(|(_, line)| line.limit.is_some()).collect();
    if budgeted.is_empty() {
        let empty = Paragraph::new("No budgets set for this month")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, inner);
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Length(1); budgeted.len()])
        .split(inner);

    for ((category, line), row) in budgeted.into_iter().zip(rows.iter()) {
        let ratio = line
            .limit
            .filter(|limit| *limit > Decimal::ZERO)
            .and_then(|limit| line.spent.checked_div(limit))
            .and_then(|ratio| ratio.to_f64())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        let label = format!(
            "{:<15} {} / {}  {}",
            category.as_str(),
            line.spent,
            line.limit.unwrap_or_default(),
            line.status
        );
        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(status_color(line)))
            .ratio(ratio)
            .label(label);
        frame.render_widget(gauge, *row);
    }
}

fn render_recent_table(frame: &mut ratatui::Frame, area: Rect, data: &DashboardData) {
    let block = Block::default().title("Recent Transactions").borders(Borders::ALL);
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let header = Row::new([
        Cell::from("Date").style(bold),
        Cell::from("Vendor").style(bold),
        Cell::from("Amount").style(bold),
        Cell::from("Category").style(bold),
        Cell::from("Source").style(bold),
    ])
    .style(Style::default().fg(Color::White));

    let rows = data.summary.recent.iter().map(|tx| {
        let mut vendor = tx.vendor.clone();
        if vendor.chars().count() > 28 {
            vendor = vendor.chars().take(25).collect::<String>() + "...";
        }
        Row::new([
            Cell::from(tx.date.format("%Y-%m-%d").to_string()),
            Cell::from(vendor),
            Cell::from(tx.amount.to_string()),
            Cell::from(tx.category.as_str()),
            Cell::from(tx.source_type.as_str()),
        ])
    });

    let widths = [
        Constraint::Length(10),
        Constraint::Percentage(40),
        Constraint::Length(12),
        Constraint::Length(14),
        Constraint::Length(12),
    ];

    let table = Table::new(rows, widths).header(header).block(block).column_spacing(1);
    frame.render_widget(table, area);
}

fn render_category_spend(frame: &mut ratatui::Frame, area: Rect, data: &DashboardData) {
    let block = Block::default().title("Category Spend").borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if data.summary.by_category.is_empty() {
        let empty = Paragraph::new("No transactions yet").alignment(Alignment::Center);
        frame.render_widget(empty, inner);
        return;
    }

    let lines: Vec<Line> = data
        .summary
        .by_category
        .iter()
        .map(|(category, amount)| {
            Line::from(vec![
                Span::styled(format!("{:15}", category.as_str()), Style::default().fg(Color::Cyan)),
                Span::raw("  "),
                Span::raw(format!("{:>12}", amount)),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Left), inner);
}
