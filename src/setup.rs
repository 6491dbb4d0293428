use crate::config::{Prompter, DEFAULT_HOST};
use crate::errors::{CleanupError, CleanupResult, ConfigField};
use std::io::{self, BufRead, Write};

/// Prompts on stdout and reads answers line by line from `input`.
pub struct TerminalPrompter<R> {
    input: R,
}

impl TerminalPrompter<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self {
            input: io::stdin().lock(),
        }
    }
}

impl<R: BufRead> TerminalPrompter<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }

    fn read_line(&mut self, label: &str) -> CleanupResult<String> {
        print!("{}", label);
        io::stdout()
            .flush()
            .map_err(|e| CleanupError::Prompt(e.to_string()))?;
        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .map_err(|e| CleanupError::Prompt(e.to_string()))?;
        Ok(line.trim().to_string())
    }
}

pub fn print_banner(title: &str) {
    println!("{}", "=".repeat(80));
    println!("{}", title);
    println!("{}", "=".repeat(80));
    println!();
}

fn field_help(field: ConfigField) -> &'static [&'static str] {
    match field {
        ConfigField::Host => &[
            "  The Amazon API host for your region.",
            "  Find in: GET /api/behaviors/entities request",
            "  Examples: 'na-api-alexa.amazon.com', 'eu-api-alexa.amazon.co.uk'",
        ],
        ConfigField::Cookie => &[
            "  The full Cookie header value (will be very long).",
            "  Find in: Cookie header from GET /api/behaviors/entities request",
        ],
        ConfigField::AlexaApp => &[
            "  The x-amzn-alexa-app header value (base64 encoded app info).",
            "  Find in: x-amzn-alexa-app header from GET /api/behaviors/entities request",
        ],
        ConfigField::DeleteSkill => &[
            "  The skill identifier used in DELETE requests.",
            "  Find in: DELETE request containing '/api/phoenix/appliance/'",
            "  Copy the part after 'api/phoenix/appliance/' but before '%3D%3D_'",
            "  Example format: 'SKILL_abc123abc...' (much longer)",
        ],
    }
}

impl<R: BufRead> Prompter for TerminalPrompter<R> {
    fn intro(&mut self) {
        println!("HTTP Sniffer Setup (do this first):");
        println!("  1. Open Alexa app and navigate to Devices tab");
        println!("  2. Start HTTP Sniffer capture (e.g., HTTP Catcher, Proxyman, HTTP Toolkit)");
        println!("  3. Refresh device list in Alexa app");
        println!("  4. Delete a device using the Alexa app (to capture DELETE request)");
        println!("  5. Stop the capture in your HTTP Sniffer");
        println!();
        println!("Now extract the following values from your HTTP Sniffer:");
        println!();
    }

    fn ask(&mut self, field: ConfigField) -> CleanupResult<Option<String>> {
        println!("{}:", field.display_name());
        for line in field_help(field) {
            println!("{}", line);
        }
        println!();
        let label = match field {
            ConfigField::Host => format!("Enter HOST (default: {}): ", DEFAULT_HOST),
            other => format!("Enter {}: ", other.display_name()),
        };
        let answer = self.read_line(&label)?;
        println!();
        Ok(Some(answer).filter(|a| !a.is_empty()))
    }

    fn provided(&mut self, field: ConfigField, value: &str) {
        match field {
            ConfigField::Host => println!("✓ Using HOST from arguments: {}", value),
            ConfigField::Cookie => println!(
                "✓ Using COOKIE from arguments (length: {} characters)",
                value.len()
            ),
            other => println!("✓ Using {} from arguments", other.display_name()),
        }
    }

    fn csrf_extracted(&mut self, csrf: &str) {
        println!("✓ CSRF token automatically extracted from cookie: {}", csrf);
        println!();
    }
}
