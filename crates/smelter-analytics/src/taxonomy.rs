// Smelter error taxonomy
//
// Every error Smelter raises on purpose carries a numeric code. Codes are
// grouped into categories by range; the registry below maps a code to its
// human-readable descriptor. Only used to enrich outbound error reports.

use serde::Serialize;
use thiserror::Error;

/// A contiguous range of error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorCategory {
    pub name: &'static str,
    pub title: &'static str,
    pub min: u32,
    pub max: u32,
}

impl ErrorCategory {
    pub fn contains(&self, code: u32) -> bool {
        (self.min..=self.max).contains(&code)
    }

    /// Category owning `code`, if any
    pub fn for_code(code: u32) -> Option<&'static ErrorCategory> {
        CATEGORIES.iter().find(|category| category.contains(code))
    }
}

pub const GENERAL: ErrorCategory = ErrorCategory {
    name: "GENERAL",
    title: "General errors",
    min: 1,
    max: 99,
};
pub const NETWORK: ErrorCategory = ErrorCategory {
    name: "NETWORK",
    title: "Network related errors",
    min: 100,
    max: 199,
};
pub const TASK_DEFINITIONS: ErrorCategory = ErrorCategory {
    name: "TASK_DEFINITIONS",
    title: "Task definition errors",
    min: 200,
    max: 299,
};
pub const ARGUMENTS: ErrorCategory = ErrorCategory {
    name: "ARGUMENTS",
    title: "Arguments related errors",
    min: 300,
    max: 399,
};
pub const RESOLVER: ErrorCategory = ErrorCategory {
    name: "RESOLVER",
    title: "Dependencies resolution errors",
    min: 400,
    max: 499,
};
pub const COMPILER: ErrorCategory = ErrorCategory {
    name: "COMPILER",
    title: "Compiler download and execution errors",
    min: 500,
    max: 599,
};
pub const BUILTIN_TASKS: ErrorCategory = ErrorCategory {
    name: "BUILTIN_TASKS",
    title: "Built-in tasks errors",
    min: 600,
    max: 699,
};
pub const ARTIFACTS: ErrorCategory = ErrorCategory {
    name: "ARTIFACTS",
    title: "Artifacts related errors",
    min: 700,
    max: 799,
};
pub const PLUGINS: ErrorCategory = ErrorCategory {
    name: "PLUGINS",
    title: "Plugin system errors",
    min: 800,
    max: 899,
};

pub const CATEGORIES: &[ErrorCategory] = &[
    GENERAL,
    NETWORK,
    TASK_DEFINITIONS,
    ARGUMENTS,
    RESOLVER,
    COMPILER,
    BUILTIN_TASKS,
    ARTIFACTS,
    PLUGINS,
];

/// A known, numbered Smelter error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorDescriptor {
    pub code: u32,
    pub name: &'static str,
    pub title: &'static str,
    pub message: &'static str,
    pub description: &'static str,
}

impl ErrorDescriptor {
    /// Look a descriptor up by code
    pub fn lookup(code: u32) -> Option<&'static ErrorDescriptor> {
        DESCRIPTORS.iter().find(|descriptor| descriptor.code == code)
    }

    pub fn category(&self) -> Option<&'static ErrorCategory> {
        ErrorCategory::for_code(self.code)
    }
}

pub const DESCRIPTORS: &[ErrorDescriptor] = &[
    ErrorDescriptor {
        code: 1,
        name: "NOT_INSIDE_PROJECT",
        title: "You are not inside a Smelter project",
        message: "You are not inside a Smelter project.",
        description: "Smelter was run outside of a directory containing a Smelter config file.",
    },
    ErrorDescriptor {
        code: 2,
        name: "INVALID_CONFIG",
        title: "Invalid Smelter config",
        message: "Invalid value in Smelter config.",
        description: "The config file has a value of the wrong type or shape.",
    },
    ErrorDescriptor {
        code: 3,
        name: "UNSUPPORTED_OPERATION",
        title: "Unsupported operation",
        message: "This operation is not supported.",
        description: "A feature was requested that this version of Smelter does not implement.",
    },
    ErrorDescriptor {
        code: 100,
        name: "CONFIG_NOT_FOUND",
        title: "Selected network doesn't exist",
        message: "Network not defined in the config.",
        description: "The --network argument named a network that is not in the config file.",
    },
    ErrorDescriptor {
        code: 101,
        name: "NODE_IS_NOT_RESPONDING",
        title: "Node is not responding",
        message: "Cannot connect to the network.",
        description: "The configured node URL did not answer a request in time.",
    },
    ErrorDescriptor {
        code: 200,
        name: "PARAM_AFTER_VARIADIC",
        title: "Could not add positional param",
        message: "Positional params cannot follow a variadic param.",
        description: "A task definition declared a positional param after a variadic one.",
    },
    ErrorDescriptor {
        code: 201,
        name: "OVERRIDE_NO_PARAMS",
        title: "Attempted to add params to an overridden task",
        message: "Redefinition of a task cannot add params.",
        description: "Overriding a builtin task may change its action but not its params.",
    },
    ErrorDescriptor {
        code: 300,
        name: "INVALID_ARGUMENT_VALUE",
        title: "Invalid argument value",
        message: "Invalid value for argument.",
        description: "A command line argument could not be parsed into its declared type.",
    },
    ErrorDescriptor {
        code: 301,
        name: "UNRECOGNIZED_TASK",
        title: "Unrecognized task",
        message: "Unrecognized task.",
        description: "The task named on the command line is not defined.",
    },
    ErrorDescriptor {
        code: 400,
        name: "LIBRARY_NOT_INSTALLED",
        title: "Library not installed",
        message: "Library is not installed.",
        description: "A source file imports a library that is not installed in the project.",
    },
    ErrorDescriptor {
        code: 401,
        name: "IMPORTED_FILE_NOT_FOUND",
        title: "Imported file not found",
        message: "File imported from a source file could not be found.",
        description: "An import statement refers to a path that does not exist.",
    },
    ErrorDescriptor {
        code: 500,
        name: "COMPILER_DOWNLOAD_FAILED",
        title: "Compiler download failed",
        message: "Couldn't download the compiler.",
        description: "The compiler binary for the configured version could not be downloaded.",
    },
    ErrorDescriptor {
        code: 501,
        name: "INVALID_COMPILER_VERSION",
        title: "Invalid compiler version",
        message: "Compiler version is invalid or hasn't been released yet.",
        description: "The configured compiler version is not in the release list.",
    },
    ErrorDescriptor {
        code: 600,
        name: "COMPILE_FAILURE",
        title: "Compilation failed",
        message: "Compilation failed.",
        description: "The compiler reported at least one error.",
    },
    ErrorDescriptor {
        code: 601,
        name: "RUN_FILE_NOT_FOUND",
        title: "Script doesn't exist",
        message: "Script passed to run doesn't exist.",
        description: "The run task was given a path that does not exist.",
    },
    ErrorDescriptor {
        code: 602,
        name: "TEST_FAILURES",
        title: "Tests failed",
        message: "Some tests failed.",
        description: "The test task finished with failing tests.",
    },
    ErrorDescriptor {
        code: 700,
        name: "ARTIFACT_NOT_FOUND",
        title: "Artifact not found",
        message: "Artifact not found.",
        description: "The requested build artifact was not produced or has been cleaned.",
    },
    ErrorDescriptor {
        code: 800,
        name: "PLUGIN_NOT_INSTALLED",
        title: "Plugin not installed",
        message: "Plugin is not installed.",
        description: "The config file loads a plugin that is not installed.",
    },
    ErrorDescriptor {
        code: 801,
        name: "PLUGIN_DEPENDENCY_MISSING",
        title: "Plugin dependency not installed",
        message: "Plugin requires a dependency that is not installed.",
        description: "A loaded plugin declares a peer dependency that is missing.",
    },
];

/// An error raised deliberately by Smelter itself
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("SM{code}: {message}")]
pub struct SmelterError {
    pub code: u32,
    pub message: String,
    /// Extra detail about where the error surfaced
    pub context_message: Option<String>,
}

impl SmelterError {
    /// Raise a registered error with its default message
    pub fn new(descriptor: &ErrorDescriptor) -> Self {
        Self {
            code: descriptor.code,
            message: descriptor.message.to_string(),
            context_message: None,
        }
    }

    /// Raise an error by code with a custom message
    pub fn with_code(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context_message: None,
        }
    }

    pub fn with_context_message(mut self, context_message: impl Into<String>) -> Self {
        self.context_message = Some(context_message.into());
        self
    }

    pub fn descriptor(&self) -> Option<&'static ErrorDescriptor> {
        ErrorDescriptor::lookup(self.code)
    }
}

/// An error raised by a plugin
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error in plugin {plugin_name}: {message}")]
pub struct PluginError {
    pub plugin_name: String,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            message: message.into(),
        }
    }
}
