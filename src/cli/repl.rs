use anyhow::{anyhow, Result};
use serde::Serialize;

use super::table::render_records;
use crate::error::ApiError;
use crate::resources::{CandidateInput, ChangePasswordRequest, NewVoter, Outcome};
use crate::routes::Route;
use crate::shell::{AppShell, View};
use crate::validation::{
    validate_candidate, validate_change_password, validate_forgot_password, validate_new_voter, validate_sign_in,
    validate_sign_up, SignUpForm, ValidationErrors,
};

pub const HELP: &str = "\
Commands:
  login <email> <password>                      sign in to the admin portal
  logout                                        sign out and clear the stored session
  forgot-password <email>                       request a password reset link
  signup <full-name> <cnic> <email> <password> <confirm>
                                                create an account (use _ for spaces in the name)
  status                                        show session state and current location
  goto <path>                                   navigate to a dashboard path (e.g. /elections)
  me                                            show the signed-in admin's profile
  change-password <current> <new> <confirm>     update the admin password
  candidates                                    list candidates
  add-candidate <name> <party> <image-url>      create an active candidate
  candidate-status <id> <status>                update a candidate's status
  delete-candidate <id>                         delete a candidate
  elections                                     list elections
  results <election-id>                         show results with winner and runner-up
  voters                                        list voters
  add-voter <name> <email> <cnic> <election-id> register a voter
  delete-voter <id>                             delete a voter
  help                                          show this help
  quit | exit                                   leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { email: String, password: String },
    Logout,
    ForgotPassword(String),
    SignUp(SignUpForm),
    Status,
    Goto(String),
    Me,
    ChangePassword { current: String, new: String, confirm: String },
    Candidates,
    AddCandidate { name: String, party: String, image: String },
    CandidateStatus { id: String, status: String },
    DeleteCandidate(String),
    Elections,
    Results(String),
    Voters,
    AddVoter(NewVoter),
    DeleteVoter(String),
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((head, args)) = parts.split_first() else { return Ok(None); };
        let want = |n: usize, usage: &str| -> Result<()> {
            if args.len() == n { Ok(()) } else { Err(anyhow!("usage: {}", usage)) }
        };
        let cmd = match head.to_ascii_lowercase().as_str() {
            "login" => {
                want(2, "login <email> <password>")?;
                Command::Login { email: args[0].to_string(), password: args[1].to_string() }
            }
            "logout" => Command::Logout,
            "forgot-password" => {
                want(1, "forgot-password <email>")?;
                Command::ForgotPassword(args[0].to_string())
            }
            "signup" => {
                want(5, "signup <full-name> <cnic> <email> <password> <confirm>")?;
                Command::SignUp(SignUpForm {
                    full_name: args[0].replace('_', " "),
                    cnic: args[1].to_string(),
                    email: args[2].to_string(),
                    password: args[3].to_string(),
                    confirm_password: args[4].to_string(),
                })
            }
            "status" => Command::Status,
            "goto" | "cd" => {
                want(1, "goto <path>")?;
                Command::Goto(args[0].to_string())
            }
            "me" | "profile" => Command::Me,
            "change-password" => {
                want(3, "change-password <current> <new> <confirm>")?;
                Command::ChangePassword { current: args[0].to_string(), new: args[1].to_string(), confirm: args[2].to_string() }
            }
            "candidates" => Command::Candidates,
            "add-candidate" => {
                want(3, "add-candidate <name> <party> <image-url>")?;
                Command::AddCandidate { name: args[0].to_string(), party: args[1].to_string(), image: args[2].to_string() }
            }
            "candidate-status" => {
                want(2, "candidate-status <id> <status>")?;
                Command::CandidateStatus { id: args[0].to_string(), status: args[1].to_string() }
            }
            "delete-candidate" => {
                want(1, "delete-candidate <id>")?;
                Command::DeleteCandidate(args[0].to_string())
            }
            "elections" => Command::Elections,
            "results" => {
                want(1, "results <election-id>")?;
                Command::Results(path_segment(args[0], "election id")?)
            }
            "voters" => Command::Voters,
            "add-voter" => {
                want(4, "add-voter <name> <email> <cnic> <election-id>")?;
                Command::AddVoter(NewVoter {
                    name: args[0].to_string(),
                    email: args[1].to_string(),
                    cnic: args[2].to_string(),
                    election_id: args[3].to_string(),
                })
            }
            "delete-voter" => {
                want(1, "delete-voter <id>")?;
                Command::DeleteVoter(args[0].to_string())
            }
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(anyhow!("unknown command '{}' (try 'help')", other)),
        };
        Ok(Some(cmd))
    }

    /// Lines carrying passwords; kept out of the line editor's history.
    pub fn is_sensitive(&self) -> bool {
        matches!(self, Command::Login { .. } | Command::ChangePassword { .. } | Command::SignUp(_))
    }

    /// View a command lives on; protected ones go through the guard first.
    fn view(&self) -> Option<Route> {
        match self {
            Command::ForgotPassword(_) => Some(Route::ForgotPassword),
            Command::SignUp(_) => Some(Route::SignUp),
            Command::Me | Command::ChangePassword { .. } => Some(Route::Profile),
            Command::Candidates
            | Command::AddCandidate { .. }
            | Command::CandidateStatus { .. }
            | Command::DeleteCandidate(_) => Some(Route::Candidates),
            Command::Elections => Some(Route::Elections),
            Command::Results(id) => Some(Route::ElectionResultView { id: id.clone() }),
            Command::Voters | Command::AddVoter(_) | Command::DeleteVoter(_) => Some(Route::Voters),
            _ => None,
        }
    }
}

// Ids that become route segments may not carry path or query syntax.
fn path_segment(raw: &str, what: &str) -> Result<String> {
    if raw.contains(['/', '?', '#', '%']) {
        return Err(anyhow!("invalid {} '{}'", what, raw));
    }
    Ok(raw.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Execute one command, then settle any session invalidations it caused.
pub async fn execute(shell: &AppShell, cmd: Command) -> Result<Flow> {
    let res = dispatch(shell, &cmd).await;
    shell.handle_invalidations();
    for notice in shell.take_notices() {
        println!("! {}", notice);
    }
    res
}

async fn dispatch(shell: &AppShell, cmd: &Command) -> Result<Flow> {
    if let Some(route) = cmd.view() {
        match shell.navigate(&route.path()) {
            View::Render(r) if r == route => {}
            View::Render(r) => return Err(anyhow!("sign in required (now at {})", r.path())),
            View::Loading => return Err(anyhow!("session still initializing")),
        }
    }
    let api = shell.store().api();
    match cmd {
        Command::Login { email, password } => {
            validate_sign_in(email, password).map_err(invalid)?;
            let view = shell.sign_in(email, password).await?;
            if let Some(s) = shell.store().current() {
                println!("signed in as {} <{}> ({})", s.identity.name, s.identity.email, s.identity.role);
            }
            print_view(&view);
        }
        Command::Logout => {
            let view = shell.sign_out();
            println!("signed out");
            print_view(&view);
        }
        Command::ForgotPassword(email) => {
            validate_forgot_password(email).map_err(invalid)?;
            println!("Password reset link has been sent to your email!");
        }
        Command::SignUp(form) => {
            validate_sign_up(form).map_err(invalid)?;
            println!("Account created successfully!");
        }
        Command::Status => {
            let state = shell.store().state();
            println!("session: {}", state.label());
            if let Some(s) = state.session() {
                println!("user: {} <{}> role={}", s.identity.name, s.identity.email, s.identity.role);
            }
            println!("location: {}", shell.location());
            if let Some(p) = shell.pending() {
                match p.state.as_ref().and_then(|s| s.get("reason")).and_then(|r| r.as_str()) {
                    Some(reason) => println!("after sign-in: {} (redirected: {})", p.location, reason),
                    None => println!("after sign-in: {}", p.location),
                }
            }
            println!("api: {}", api.base_url());
        }
        Command::Goto(path) => {
            let view = shell.navigate(path);
            print_view(&view);
        }
        Command::Me => {
            let p = api.me().await.map_err(surface)?;
            println!("{} <{}>", p.full_name(), p.email);
            println!("role: {}  country: {}  gender: {}  dob: {}", p.role, p.country, p.gender, p.dob);
        }
        Command::ChangePassword { current, new, confirm } => {
            let req = ChangePasswordRequest { current_password: current.clone(), new_password: new.clone(), confirm_password: confirm.clone() };
            validate_change_password(&req).map_err(invalid)?;
            let msg = api.change_password(&req).await.map_err(surface)?;
            println!("{}", msg.unwrap_or_else(|| "Password updated successfully!".to_string()));
        }
        Command::Candidates => {
            let list = api.list_candidates().await.map_err(surface)?;
            print_rows(&list, &["_id", "name", "party", "status", "recentElection"]);
        }
        Command::AddCandidate { name, party, image } => {
            let input = CandidateInput {
                name: name.clone(),
                party: party.clone(),
                image: image.clone(),
                status: "active".to_string(),
                recent_election: String::new(),
            };
            validate_candidate(&input).map_err(invalid)?;
            let c = api.create_candidate(&input).await.map_err(surface)?;
            println!("candidate {} created ({})", c.name, c.id);
        }
        Command::CandidateStatus { id, status } => {
            let list = api.list_candidates().await.map_err(surface)?;
            let current = list.iter().find(|c| &c.id == id).ok_or_else(|| anyhow!("no candidate with id {}", id))?;
            let mut input = CandidateInput::from(current);
            input.status = status.clone();
            let c = api.update_candidate(id, &input).await.map_err(surface)?;
            println!("candidate {} is now {}", c.name, c.status);
        }
        Command::DeleteCandidate(id) => {
            api.delete_candidate(id).await.map_err(surface)?;
            println!("candidate {} deleted", id);
        }
        Command::Elections => {
            let list = api.list_elections().await.map_err(surface)?;
            print_rows(&list, &["_id", "name", "type", "status", "startDate", "endDate"]);
        }
        Command::Results(id) => {
            let results = api.election_results(id).await.map_err(surface)?;
            let summary = results.summarize();
            println!("{} [{}] total votes: {}", results.name, results.status, summary.total_votes);
            let rows: Vec<serde_json::Value> = summary
                .standings
                .iter()
                .map(|s| serde_json::json!({"name": s.name, "party": s.party, "votes": s.votes, "share": format!("{:.2}%", s.percentage)}))
                .collect();
            if let Some(t) = render_records(&rows, &["name", "party", "votes", "share"]) { println!("{}", t); }
            match summary.outcome {
                Outcome::Winner { winner, runner_up } => {
                    println!("winner: {} ({}) {:.2}%", winner.name, winner.party, winner.percentage);
                    if let Some(r) = runner_up { println!("runner-up: {} ({}) {:.2}%", r.name, r.party, r.percentage); }
                }
                Outcome::Tie { leaders } => {
                    let names: Vec<&str> = leaders.iter().map(|s| s.name.as_str()).collect();
                    println!("tie between: {}", names.join(", "));
                }
                Outcome::NoVotes => println!("no votes cast"),
            }
        }
        Command::Voters => {
            let list = api.list_voters().await.map_err(surface)?;
            print_rows(&list, &["serialNo", "name", "email", "cnic", "electionName", "status"]);
        }
        Command::AddVoter(voter) => {
            validate_new_voter(voter).map_err(invalid)?;
            let v = api.add_voter(voter).await.map_err(surface)?;
            println!("voter {} registered (serial {})", v.name, v.serial_no);
        }
        Command::DeleteVoter(id) => {
            api.delete_voter(id).await.map_err(surface)?;
            println!("voter {} deleted", id);
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

fn invalid(errs: ValidationErrors) -> anyhow::Error {
    let lines: Vec<String> = errs.fields().map(|(field, msg)| format!("  {}: {}", field, msg)).collect();
    anyhow!("invalid input:\n{}", lines.join("\n"))
}

// 401s are reported by the shell's notice; other failures go to the user verbatim.
fn surface(e: ApiError) -> anyhow::Error {
    if e.is_session_invalidated() { anyhow!("request rejected: not signed in") } else { anyhow!(e) }
}

fn print_view(view: &View) {
    match view {
        View::Loading => println!("[loading]"),
        View::Render(r) => println!("[{}] {}", r.title(), r.path()),
    }
}

fn print_rows<T: Serialize>(items: &[T], columns: &[&str]) {
    let values: Vec<serde_json::Value> = items.iter().filter_map(|i| serde_json::to_value(i).ok()).collect();
    match render_records(&values, columns) {
        Some(t) => println!("{}", t),
        None => println!("(none)"),
    }
}
