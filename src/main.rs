use worktreefoundry::ui::output;

fn main() {
    if let Err(err) = worktreefoundry::cli::run() {
        output::error(format!("{err:#}"));
        std::process::exit(1);
    }
}
