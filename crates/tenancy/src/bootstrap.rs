//! Built-in defaults for the agent bootstrap files.
//!
//! These are the last layer of the `custom > template > builtin` resolution
//! chain: fixed markdown bodies served when neither the user nor the
//! deployment template defines the file.

/// Agent manifest: what the workspace contains and how files are loaded.
pub const AGENTS_FILE: &str = "AGENTS.md";
/// Persona / soul definition.
pub const SOUL_FILE: &str = "SOUL.md";
/// Tool usage notes.
pub const TOOLS_FILE: &str = "TOOLS.md";
/// Agent identity (name, vibe).
pub const IDENTITY_FILE: &str = "IDENTITY.md";
/// Facts about the human the agent works for.
pub const USER_FILE: &str = "USER.md";
/// Instructions for the periodic heartbeat turn.
pub const HEARTBEAT_FILE: &str = "HEARTBEAT.md";
/// First-run instructions.
pub const BOOTSTRAP_FILE: &str = "BOOTSTRAP.md";
/// Long-term memory index.
pub const MEMORY_FILE: &str = "MEMORY.md";

/// Filename → default body for every bootstrap file.
pub const BUILTIN_DEFAULTS: &[(&str, &str)] = &[
    (
        AGENTS_FILE,
        "# AGENTS.md - Your Workspace\n\nThis folder is your working directory. Files here are \
         loaded into context at the start of each session.\n\n- `SOUL.md` - who you are\n- \
         `USER.md` - who you work for\n- `TOOLS.md` - notes on your tools\n- `IDENTITY.md` - \
         your name and vibe\n- `memory/` - daily notes you keep\n\nKeep edits small and \
         purposeful.\n",
    ),
    (
        SOUL_FILE,
        "# SOUL.md\n\nYou are a capable, honest assistant. Be direct. Admit what you don't \
         know. Don't perform enthusiasm.\n\nYou are new here. This file is yours to grow \
         into.\n",
    ),
    (
        TOOLS_FILE,
        "# TOOLS.md\n\nNotes about the tools available in this workspace. Add what you learn \
         about local conventions here.\n",
    ),
    (
        IDENTITY_FILE,
        "# IDENTITY.md\n\nName: (not chosen yet)\nVibe: helpful, plain-spoken\n",
    ),
    (
        USER_FILE,
        "# USER.md\n\nFacts about the person you work for. Fill this in as you learn.\n",
    ),
    (
        HEARTBEAT_FILE,
        "# HEARTBEAT.md\n\nWhen a heartbeat turn arrives, check for anything that needs \
         attention. If nothing does, reply with HEARTBEAT_OK and stop.\n",
    ),
    (
        BOOTSTRAP_FILE,
        "# BOOTSTRAP.md\n\nFirst run. Introduce yourself, then read the other files in this \
         workspace to learn your setup.\n",
    ),
    (
        MEMORY_FILE,
        "# MEMORY.md\n\nLong-term notes. Daily files live in `memory/YYYY-MM-DD.md`; promote \
         anything durable here.\n",
    ),
];

/// Look up the built-in default body for `filename`, if one exists.
pub fn builtin_default(filename: &str) -> Option<&'static str> {
    BUILTIN_DEFAULTS
        .iter()
        .find(|(name, _)| *name == filename)
        .map(|(_, body)| *body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_bootstrap_files_have_defaults() {
        for name in [
            AGENTS_FILE,
            SOUL_FILE,
            TOOLS_FILE,
            IDENTITY_FILE,
            USER_FILE,
            HEARTBEAT_FILE,
            BOOTSTRAP_FILE,
            MEMORY_FILE,
        ] {
            let body = builtin_default(name).unwrap_or_default();
            assert!(!body.is_empty(), "missing default for {name}");
        }
    }

    #[test]
    fn unknown_file_has_no_default() {
        assert!(builtin_default("NOTES.md").is_none());
    }
}
