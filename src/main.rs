use std::path::PathBuf;

use anyhow::{Context, Result};
use log::debug;
use rustyline::{error::ReadlineError, Editor};
use structopt::StructOpt;

use raql::{parse_relation, parse_relations, Database};

const EXAMPLE_QUERIES: [&str; 7] = [
    "select(Age>30)(Employees)",
    "select(DID == 'D1')(Departments)",
    "project(Name, Age)(Employees)",
    "join(Employees, Departments) at DID = DID",
    "union(Table1, Table2)",
    "difference(Table1, Table2)",
    "difference(Table2, Table1)",
];

#[derive(Debug, StructOpt)]
#[structopt(name = "raql", about = "Relational algebra queries over in-memory relations")]
struct Opt {
    /// Start with the sample relations instead of asking
    #[structopt(long)]
    sample: bool,

    /// Load relation literals from this file instead of asking
    #[structopt(long, parse(from_os_str))]
    relations: Option<PathBuf>,

    /// Load and save line-editing history here
    #[structopt(long, parse(from_os_str))]
    history: Option<PathBuf>,
}

fn banner(title: &str) -> String {
    format!("---------------{}--------------------|", title)
}

/// Reads one line; `None` on Ctrl-C or Ctrl-D.
fn prompt(editor: &mut Editor<()>, text: &str) -> Result<Option<String>> {
    match editor.readline(text) {
        Ok(line) => {
            editor.add_history_entry(line.as_str());
            Ok(Some(line.trim().to_owned()))
        }
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn is_exit(line: &str) -> bool {
    line.eq_ignore_ascii_case("e")
}

fn enter_tables(editor: &mut Editor<()>) -> Result<Database> {
    let mut database = Database::new();

    loop {
        let name = match prompt(
            editor,
            "Enter the table name (or 'e' to exit) (# example input: Employees): ",
        )? {
            Some(name) if !is_exit(&name) => name,
            _ => break,
        };

        let attributes = match prompt(
            editor,
            "Enter the table attributes (# example input: EID, Name, Age, DID) : ",
        )? {
            Some(attributes) => attributes,
            None => break,
        };

        let mut rows = vec![];
        while let Some(row) = prompt(
            editor,
            "Enter the next row of the table tuples (or 'e' to exit) ((# example input: E1, John, 32, D1)): ",
        )? {
            if is_exit(&row) {
                break;
            }
            rows.push(row);
        }

        let literal = format!("{} ({}) = {{{}}}", name, attributes, rows.join("\n"));
        match parse_relation(&literal) {
            Ok(relation) => {
                database.insert(relation);
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    Ok(database)
}

fn load_database(editor: &mut Editor<()>, opt: &Opt) -> Result<Option<(Database, &'static str)>> {
    if let Some(path) = &opt.relations {
        let code = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let relations = parse_relations(&code)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        return Ok(Some((Database::from(relations), "Loaded Tables + Values")));
    }

    if opt.sample {
        return Ok(Some((Database::sample(), "Sample Tables + Values")));
    }

    let choice = prompt(
        editor,
        "Do you want to create your own tables (inputting 'n' will use sample tables) ? (y/n): ",
    )?;
    match choice.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("n") => Ok(Some((Database::sample(), "Sample Tables + Values"))),
        Some("y") => {
            println!("{}", banner("Enter Tables"));
            println!();
            Ok(Some((enter_tables(editor)?, "Inputted Tables + Values")))
        }
        _ => {
            println!("Invalid input. Exiting program.");
            Ok(None)
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut editor = Editor::<()>::new();
    if let Some(history) = &opt.history {
        if let Err(err) = editor.load_history(history) {
            debug!("no history loaded from {}: {}", history.display(), err);
        }
    }

    let (database, title) = match load_database(&mut editor, &opt)? {
        Some(loaded) => loaded,
        None => return Ok(()),
    };

    println!("{}", banner(title));
    println!();
    for relation in database.relations() {
        println!("{}", relation);
        println!();
    }
    println!("{}", banner(title));
    println!();

    println!("{}", banner("Example Queries"));
    for query in EXAMPLE_QUERIES {
        println!("{}", query);
    }
    println!("{}", banner("Example Queries"));

    loop {
        println!();
        let query = match prompt(&mut editor, "Please enter a query : ")? {
            Some(query) if !is_exit(&query) => query,
            _ => break,
        };

        match database.query(&query) {
            Ok(result) => {
                println!("{}", banner("Query Result"));
                println!("{}", result);
                println!("{}", banner("Query Result"));
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    if let Some(history) = &opt.history {
        editor
            .save_history(history)
            .with_context(|| format!("Failed to save history to {}", history.display()))?;
    }

    Ok(())
}
