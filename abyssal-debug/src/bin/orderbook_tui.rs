//! Real-Time Orderbook Terminal UI
//!
//! Live visualization of the dense 400-level order book maintained by
//! `abyssal_core::book::OrderBook`, driven by a synthetic depth feed (the
//! upstream exchange WebSocket feed is an external collaborator out of
//! scope for this crate — see §1 Non-goals). Useful for eyeballing book
//! shape and feature imbalance without a live exchange connection.
//!
//! ## Usage
//!
//! ```bash
//! orderbook-tui
//! ```
//!
//! ## Keyboard Controls
//!
//! - `q` or `Ctrl-C` - Quit
//! - `p` - Pause/Resume updates
//! - `r` - Reset tick counter
//! - `m` - Toggle metrics panel

use abyssal_core::book::depth::compute_features;
use abyssal_core::book::{OrderBook, LEVELS_PER_SIDE};
use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

struct App {
    book: OrderBook,
    paused: bool,
    tick_count: u64,
    show_metrics: bool,
}

impl App {
    fn new() -> Self {
        let mut app = Self {
            book: OrderBook::new(),
            paused: false,
            tick_count: 0,
            show_metrics: true,
        };
        app.apply_tick();
        app
    }

    /// Re-snapshot the book from a synthetic depth frame (TODO: replace
    /// with a real exchange WebSocket client once one exists).
    fn apply_tick(&mut self) {
        if self.paused {
            return;
        }
        let (bids, asks) = mock_levels(self.tick_count);
        self.book
            .apply_snapshot(&bids, &asks)
            .expect("synthetic snapshot always satisfies the 400-level invariant");
        self.tick_count += 1;
    }
}

fn mock_levels(tick: u64) -> (Vec<(f64, f64, f64)>, Vec<(f64, f64, f64)>) {
    let wave = (tick as f64 / 10.0).sin() * 50.0;
    let best_bid = 50_000.0 + wave - 5.0;
    let best_ask = 50_000.0 + wave + 5.0;

    let bids = (0..LEVELS_PER_SIDE)
        .map(|i| {
            let price = best_bid - i as f64 * 0.5;
            let volume = 0.5 + (i % 10) as f64 * 0.1;
            (price, volume, 1.0 + (i % 4) as f64)
        })
        .collect();
    let asks = (0..LEVELS_PER_SIDE)
        .map(|i| {
            let price = best_ask + i as f64 * 0.5;
            let volume = 0.8 + (i % 10) as f64 * 0.15;
            (price, volume, 1.0 + (i % 4) as f64)
        })
        .collect();
    (bids, asks)
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>) -> Result<()> {
    let mut app = App::new();
    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, &app))?;

        let timeout = tick_rate.checked_sub(last_tick.elapsed()).unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Char('p') => app.paused = !app.paused,
                    KeyCode::Char('m') => app.show_metrics = !app.show_metrics,
                    KeyCode::Char('r') => app.tick_count = 0,
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.apply_tick();
            last_tick = Instant::now();
        }
    }
}

fn spread_bps(book: &OrderBook) -> f64 {
    let mid = book.mid_price();
    if mid == 0.0 {
        return 0.0;
    }
    (book.best_ask() - book.best_bid()) / mid * 10_000.0
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(3)])
        .split(f.area());

    render_header(f, chunks[0], app);
    render_orderbook(f, chunks[1], app);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mid = app.book.mid_price();
    let spread = spread_bps(&app.book);

    let status = if app.paused { "PAUSED" } else { "LIVE" };
    let status_color = if app.paused { Color::Yellow } else { Color::Green };

    let title = Line::from(vec![
        Span::styled(
            "ABYSSAL ORDERBOOK VIEWER",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | BTC/USD | "),
        Span::styled(status, Style::default().fg(status_color).add_modifier(Modifier::BOLD)),
    ]);

    let info = Line::from(vec![
        Span::raw("Ticks: "),
        Span::styled(format!("{}", app.tick_count), Style::default().fg(Color::White)),
        Span::raw(" | Mid: $"),
        Span::styled(format!("{:.2}", mid), Style::default().fg(Color::Yellow)),
        Span::raw(" | Spread: "),
        Span::styled(format!("{:.1}bps", spread), Style::default().fg(Color::Magenta)),
    ]);

    let block = Block::default().borders(Borders::ALL).style(Style::default().fg(Color::White));
    let paragraph = Paragraph::new(vec![title, info]).block(block).alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

fn render_orderbook(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);

    render_ladder(f, chunks[0], app);
    if app.show_metrics {
        render_metrics(f, chunks[1], app);
    }
}

fn render_ladder(f: &mut Frame, area: Rect, app: &App) {
    let ask_levels = app.book.asks.levels();
    let bid_levels = app.book.bids.levels();

    let max_size = ask_levels
        .iter()
        .take(5)
        .chain(bid_levels.iter().take(5))
        .map(|l| l.volume)
        .fold(0.0, f64::max);

    let mut items = Vec::new();

    for level in ask_levels.iter().take(5).rev() {
        let bar = create_bar(level.volume, max_size, 20);
        items.push(ListItem::new(Line::from(vec![
            Span::styled("ASK ", Style::default().fg(Color::Red)),
            Span::styled(
                format!("{:>10.2}", level.price),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(bar, Style::default().fg(Color::Red)),
            Span::raw("  "),
            Span::styled(format!("{:.4} BTC", level.volume), Style::default().fg(Color::White)),
        ])));
    }

    let mid = app.book.mid_price();
    items.push(ListItem::new(Line::from(vec![
        Span::raw("─────"),
        Span::styled(
            format!(" MID: ${:.2} ", mid),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw("─────"),
    ])));

    for level in bid_levels.iter().take(5) {
        let bar = create_bar(level.volume, max_size, 20);
        items.push(ListItem::new(Line::from(vec![
            Span::styled("BID ", Style::default().fg(Color::Green)),
            Span::styled(
                format!("{:>10.2}", level.price),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(bar, Style::default().fg(Color::Green)),
            Span::raw("  "),
            Span::styled(format!("{:.4} BTC", level.volume), Style::default().fg(Color::White)),
        ])));
    }

    let list = List::new(items)
        .block(
            Block::default()
                .title("Orderbook Ladder (Top 5 Levels)")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White)),
        )
        .style(Style::default().fg(Color::White));

    f.render_widget(list, area);
}

fn render_metrics(f: &mut Frame, area: Rect, app: &App) {
    let features = compute_features(&app.book);
    let imbalance = features[0].volume_imbalance * 100.0;

    let (imbalance_text, imbalance_color) = if imbalance > 10.0 {
        ("Buy Pressure ↑", Color::Green)
    } else if imbalance < -10.0 {
        ("Sell Pressure ↓", Color::Red)
    } else {
        ("Balanced", Color::Yellow)
    };

    let text = vec![
        Line::from(vec![Span::styled(
            "MARKET DEPTH",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )]),
        Line::from(""),
        Line::from(vec![
            Span::raw("Bid Levels: "),
            Span::styled(format!("{}", app.book.bids.len()), Style::default().fg(Color::Green)),
        ]),
        Line::from(vec![
            Span::raw("Ask Levels: "),
            Span::styled(format!("{}", app.book.asks.len()), Style::default().fg(Color::Red)),
        ]),
        Line::from(""),
        Line::from(vec![Span::styled(
            "IMBALANCE (depth 10)",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )]),
        Line::from(vec![Span::styled(imbalance_text, Style::default().fg(imbalance_color))]),
        Line::from(vec![
            Span::raw("Value: "),
            Span::styled(format!("{:+.1}%", imbalance), Style::default().fg(imbalance_color)),
        ]),
        Line::from(""),
        Line::from(vec![Span::styled(
            "STATISTICS",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )]),
        Line::from(vec![
            Span::raw("Updates: "),
            Span::styled(format!("{}", app.tick_count), Style::default().fg(Color::White)),
        ]),
    ];

    let paragraph = Paragraph::new(text)
        .block(
            Block::default()
                .title("Metrics")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White)),
        )
        .wrap(Wrap { trim: true });

    f.render_widget(paragraph, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let controls = Line::from(vec![
        Span::styled("Controls: ", Style::default().fg(Color::Cyan)),
        Span::raw("[Q]uit "),
        Span::raw("[P]ause "),
        Span::raw("[M]etrics "),
        Span::raw("[R]eset"),
    ]);

    let paragraph = Paragraph::new(controls)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);

    f.render_widget(paragraph, area);
}

fn create_bar(size: f64, max_size: f64, width: usize) -> String {
    if max_size <= 0.0 {
        return " ".repeat(width);
    }
    let filled = ((size / max_size) * width as f64) as usize;
    let filled = filled.min(width);
    let mut bar = String::with_capacity(width);
    for i in 0..width {
        bar.push(if i < filled { '█' } else { '░' });
    }
    bar
}
