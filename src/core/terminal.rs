use console::{Emoji, style};

pub static SUCCESS_ICON: Emoji<'_, '_> = Emoji("✅ ", "");
pub static INFO_ICON: Emoji<'_, '_> = Emoji("ℹ️  ", "");
pub static WARN_ICON: Emoji<'_, '_> = Emoji("⚠️  ", "");
pub static ERROR_ICON: Emoji<'_, '_> = Emoji("❌ ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");
pub static EMPTY_ICON: Emoji<'_, '_> = Emoji("▫️  ", "- ");

pub fn print_success(msg: &str) {
    println!("{} {}", SUCCESS_ICON, style(msg).green());
}

pub fn print_info(msg: &str) {
    println!("{} {}", INFO_ICON, style(msg).blue());
}

pub fn print_warn(msg: &str) {
    println!("{} {}", WARN_ICON, style(msg).yellow());
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", ERROR_ICON, style(msg).red().bold());
}

pub fn print_status(label: &str, msg: &str) {
    println!("  {} {}: {}", GEAR, style(label).bold().cyan(), msg);
}

pub fn print_step(step: &str) {
    println!("{} {}", SPARKLE, style(step).bold());
}

pub fn print_empty(msg: &str) {
    println!("{} {}", EMPTY_ICON, style(msg).dim());
}

pub fn print_banner() {
    println!(
        "\n{} {}\n",
        style("fleetquery").bold().cyan(),
        style("one plan, every datacenter").dim()
    );
}

/// A titled block of aligned `name  description` lines for help output.
pub struct GuideSection {
    title: String,
    entries: Vec<(String, String)>,
}

impl GuideSection {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn command(mut self, name: &str, description: &str) -> Self {
        self.entries
            .push((name.to_string(), description.to_string()));
        self
    }

    pub fn render(&self) -> Vec<String> {
        let width = self
            .entries
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0);
        let mut lines = vec![format!(" {}", style(&self.title).bold().underlined())];
        for (name, description) in &self.entries {
            lines.push(format!(
                "   {}  {}",
                style(format!("{:<width$}", name, width = width)).green(),
                description
            ));
        }
        lines
    }

    pub fn print(&self) {
        println!();
        for line in self.render() {
            println!("{}", line);
        }
    }
}
