//! `console` object forwarding to the log.
//!
//! Generated components often log while they run. Every `console` method is
//! routed to `tracing` under the `capsule::console` target instead of stdout.

use std::pin::pin;

/// Console methods installed in the sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl ConsoleLevel {
    pub const ALL: [ConsoleLevel; 5] = [
        ConsoleLevel::Log,
        ConsoleLevel::Info,
        ConsoleLevel::Warn,
        ConsoleLevel::Error,
        ConsoleLevel::Debug,
    ];

    /// Method name on the `console` object.
    pub fn method(self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Debug => "debug",
        }
    }

    fn code(self) -> i32 {
        self as i32
    }

    fn from_code(code: i64) -> Self {
        Self::ALL
            .into_iter()
            .find(|level| i64::from(level.code()) == code)
            .unwrap_or(ConsoleLevel::Log)
    }

    fn emit(self, line: &str) {
        match self {
            ConsoleLevel::Log | ConsoleLevel::Info => {
                tracing::info!(target: "capsule::console", "{}", line)
            }
            ConsoleLevel::Warn => tracing::warn!(target: "capsule::console", "{}", line),
            ConsoleLevel::Error => tracing::error!(target: "capsule::console", "{}", line),
            ConsoleLevel::Debug => tracing::debug!(target: "capsule::console", "{}", line),
        }
    }
}

/// Install a global `console` object.
///
/// Returns `None` if V8 refused to allocate any of the handles.
pub fn register_console(scope: &mut v8::ContextScope<'_, '_, v8::HandleScope<'_>>) -> Option<()> {
    let global = scope.get_current_context().global(scope);
    let console = v8::Object::new(scope);

    for level in ConsoleLevel::ALL {
        let data = v8::Integer::new(scope, level.code());
        let function = v8::Function::builder(console_callback)
            .data(data.into())
            .build(scope)?;
        let key = v8::String::new(scope, level.method())?;
        console.set(scope, key.into(), function.into())?;
    }

    let key = v8::String::new(scope, "console")?;
    global.set(scope, key.into(), console.into())?;
    Some(())
}

fn console_callback(
    scope: &mut v8::PinScope<'_, '_>,
    args: v8::FunctionCallbackArguments<'_>,
    _rv: v8::ReturnValue<'_>,
) {
    let level = v8::Local::<v8::Integer>::try_from(args.data())
        .map(|code| ConsoleLevel::from_code(code.value()))
        .unwrap_or(ConsoleLevel::Log);

    let line = format_console_args(scope, &args);
    level.emit(&line);
}

/// Join all arguments with spaces, the way browsers print them.
fn format_console_args(
    scope: &mut v8::PinScope<'_, '_>,
    args: &v8::FunctionCallbackArguments<'_>,
) -> String {
    // A failed conversion must not leave an exception pending for the caller.
    let scope = pin!(v8::TryCatch::new(scope));
    let scope = &mut scope.init();

    let mut parts = Vec::new();

    for i in 0..args.length() {
        let arg = args.get(i);

        if let Ok(symbol) = v8::Local::<v8::Symbol>::try_from(arg) {
            let description = symbol.description(scope);
            let description = if description.is_undefined() {
                String::new()
            } else {
                description
                    .to_string(scope)
                    .map(|text| text.to_rust_string_lossy(scope))
                    .unwrap_or_default()
            };
            parts.push(format!("Symbol({description})"));
            continue;
        }

        match arg.to_string(scope) {
            Some(text) => parts.push(text.to_rust_string_lossy(scope)),
            None => {
                let kind = arg.type_of(scope).to_rust_string_lossy(scope);
                parts.push(format!("[{kind}]"));
            }
        }
    }

    parts.join(" ")
}
