//! Binary that emits the command-line options table as markdown on stdout.

fn main() {
    print!("{}", tripdash_cli::render_options_markdown());
}
