//! Terminal host driving a grabler with two stacked mappers.
//!
//! Normal mode moves a cursor with h/j/k/l and the arrow keys; `i` pushes an
//! insert-mode mapper that echoes nothing but swallows every key until
//! Escape. `?` prints the bindings of the active mode. Ctrl+Q quits.
//!
//! Run with: cargo run --example crossterm_host --features crossterm

use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::rc::Rc;

use crossterm::{
    event::{self, Event, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use keygrab::{Action, BindingSource, BindingSpec, Grabler, KeyMapper, Policy};

#[derive(Default)]
struct Cursor {
    col: Cell<i32>,
    row: Cell<i32>,
    messages: RefCell<Vec<String>>,
}

impl Cursor {
    fn shift(&self, dc: i32, dr: i32) {
        self.col.set(self.col.get() + dc);
        self.row.set(self.row.get() + dr);
        self.say(format!("cursor at {},{}", self.col.get(), self.row.get()));
    }

    fn say(&self, msg: String) {
        self.messages.borrow_mut().push(msg);
    }
}

fn motion(dc: i32, dr: i32) -> Action<Cursor> {
    Action::with_context(move |cursor: Option<&Cursor>| {
        if let Some(cursor) = cursor {
            cursor.shift(dc, dr);
        }
    })
}

fn help(mapper: &KeyMapper<Cursor>) -> String {
    mapper
        .bindings()
        .iter()
        .map(|(key, action)| {
            let what = action.description().unwrap_or_else(|| "?".into());
            format!("{key:>12}  {what}")
        })
        .collect::<Vec<_>>()
        .join("\r\n")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let grabler = Grabler::new();
    let cursor = Rc::new(Cursor::default());
    let running = Rc::new(Cell::new(true));

    let left = motion(-1, 0);
    let down = motion(0, 1);
    let up = motion(0, -1);
    let right = motion(1, 0);

    let normal: KeyMapper<Cursor> = KeyMapper::builder()
        .grabler(Rc::clone(&grabler))
        .this(Rc::clone(&cursor))
        .policy(Policy::transparent())
        .bindings(BindingSource::Tuples(vec![
            BindingSpec::new(&left).keys(["h", "arrowleft"]).describe("Move left"),
            BindingSpec::new(&down).keys(["j", "arrowdown"]).describe("Move down"),
            BindingSpec::new(&up).keys(["k", "arrowup"]).describe("Move up"),
            BindingSpec::new(&right).keys(["l", "arrowright"]).describe("Move right"),
        ]))
        .build()?;

    let insert: KeyMapper<Cursor> = KeyMapper::builder()
        .grabler(Rc::clone(&grabler))
        .this(Rc::clone(&cursor))
        .build()?;

    let leave_insert = {
        let insert = insert.clone();
        Action::with_context(move |cursor: Option<&Cursor>| {
            insert.degrable();
            if let Some(cursor) = cursor {
                cursor.say("-- NORMAL --".into());
            }
        })
    };
    insert.bind(&leave_insert, Some("escape"), None)?;

    let enter_insert = {
        let insert = insert.clone();
        Action::with_context(move |cursor: Option<&Cursor>| {
            insert.engrable();
            if let Some(cursor) = cursor {
                cursor.say("-- INSERT --".into());
            }
        })
    };
    normal.bind(&enter_insert, Some("i"), None)?;

    let show_help = {
        let normal = normal.clone();
        Action::with_context(move |cursor: Option<&Cursor>| {
            if let Some(cursor) = cursor {
                cursor.say(help(&normal));
            }
        })
    };
    normal.bind(&show_help, Some("?"), None)?;

    // Bottom layer: global quit, reachable from every mode that passes misses down.
    let quit = {
        let running = Rc::clone(&running);
        Action::new(move || running.set(false))
    };
    let global: KeyMapper<Cursor> = KeyMapper::builder()
        .grabler(Rc::clone(&grabler))
        .bindings(BindingSource::Shorthand(vec![("q c".into(), quit)]))
        .build()?;

    global.engrable();
    normal.engrable();

    enable_raw_mode()?;
    let mut out = io::stdout();
    write!(out, "h/j/k/l to move, i for insert, ? for help, ctrl+q to quit\r\n")?;
    out.flush()?;

    while running.get() {
        if let Event::Key(mut key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            grabler.grable(&mut key);
            for msg in cursor.messages.borrow_mut().drain(..) {
                write!(out, "{msg}\r\n")?;
            }
            out.flush()?;
        }
    }

    grabler.kill();
    disable_raw_mode()?;
    Ok(())
}
