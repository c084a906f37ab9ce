use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gateway_rust::client::{Action, GatewayClient};
use gateway_rust::model::{parse_number_list, Todo, TodoId};
use gateway_rust::{config, logging};
use tracing::debug;

const INVALID_NUMBERS: &str = "Please enter valid numbers separated by commas";

/// Command-line front end for the API gateway.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Gateway base URL.
    #[arg(long, env = "GATEWAY_URL", default_value = "http://localhost:3000")]
    gateway_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List todos, newest first.
    List,
    /// Add a todo.
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Replace a todo's title and optionally its other fields.
    Update {
        id: TodoId,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        completed: Option<bool>,
    },
    /// Mark a todo done, or not done with `--undo`.
    Done {
        id: TodoId,
        #[arg(long)]
        undo: bool,
    },
    /// Delete a todo.
    Delete { id: TodoId },
    /// Statistics over comma-separated numbers, e.g. "1, 2.5, 3".
    Calc { numbers: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    config::load_dotenv();
    logging::init_with_default("warn");

    let args = Args::parse();
    let client = GatewayClient::new(args.gateway_url);

    match run(&client, args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(client: &GatewayClient, command: Command) -> Result<(), &'static str> {
    match command {
        Command::List => {
            let todos = client
                .list_todos()
                .await
                .map_err(|err| failed(Action::FetchTodos, err))?;
            for todo in &todos {
                print_todo(todo);
            }
        }
        Command::Add { title, description } => {
            let todo = client
                .create_todo(&title, description.as_deref())
                .await
                .map_err(|err| failed(Action::CreateTodo, err))?;
            print_todo(&todo);
        }
        Command::Update {
            id,
            title,
            description,
            completed,
        } => {
            let todo = client
                .update_todo(id, &title, description.as_deref(), completed)
                .await
                .map_err(|err| failed(Action::UpdateTodo, err))?;
            print_todo(&todo);
        }
        Command::Done { id, undo } => {
            let todo = client
                .set_completed(id, !undo)
                .await
                .map_err(|err| failed(Action::UpdateTodo, err))?;
            print_todo(&todo);
        }
        Command::Delete { id } => {
            client
                .delete_todo(id)
                .await
                .map_err(|err| failed(Action::DeleteTodo, err))?;
            println!("deleted {id}");
        }
        Command::Calc { numbers } => {
            let numbers = parse_number_list(&numbers).map_err(|_| INVALID_NUMBERS)?;
            let reply = client
                .calculate(&numbers)
                .await
                .map_err(|err| failed(Action::Calculate, err))?;
            let stats = &reply.statistics;
            println!("sum:     {}", stats.sum);
            println!("average: {}", stats.average);
            println!("max:     {}", stats.max);
            println!("min:     {}", stats.min);
            println!("processed by {} at {}", reply.processed_by, reply.timestamp);
        }
    }
    Ok(())
}

fn failed(action: Action, err: impl std::fmt::Display) -> &'static str {
    debug!(?action, %err, "gateway call failed");
    action.failure_message()
}

fn print_todo(todo: &Todo) {
    let mark = if todo.completed { "x" } else { " " };
    match &todo.description {
        Some(description) => println!("[{mark}] {:>4}  {}  ({})", todo.id, todo.title, description),
        None => println!("[{mark}] {:>4}  {}", todo.id, todo.title),
    }
}
