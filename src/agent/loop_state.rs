//! Agent loop state management
//!
//! Tracks one turn's tool-calling loop, including observations from tool executions.

/// State of the tool-calling loop within a single turn
#[derive(Debug, Clone)]
pub struct AgentLoopState {
    /// Model calls made so far
    pub iteration: usize,
    /// Maximum allowed model calls before a final answer is forced
    pub max_iterations: usize,
    /// Observations collected from tool executions
    pub observations: Vec<Observation>,
    /// Final answer if the model has stopped calling tools
    pub final_answer: Option<String>,
}

impl AgentLoopState {
    /// Create a new loop state with the given iteration bound
    pub fn new(max_iterations: usize) -> Self {
        Self {
            iteration: 0,
            max_iterations,
            observations: Vec::new(),
            final_answer: None,
        }
    }

    /// Check if the loop should continue
    pub fn should_continue(&self) -> bool {
        self.iteration < self.max_iterations && self.final_answer.is_none()
    }

    /// Record a tool execution
    pub fn observe(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    /// Increment the iteration counter
    pub fn next_iteration(&mut self) {
        self.iteration += 1;
    }

    /// Number of failed tool executions
    pub fn failures(&self) -> usize {
        self.observations.iter().filter(|o| !o.success).count()
    }

    /// Whether the bound was hit before the model produced an answer
    pub fn exhausted(&self) -> bool {
        self.final_answer.is_none() && self.iteration >= self.max_iterations
    }
}

/// An observation from a tool execution
#[derive(Debug, Clone)]
pub struct Observation {
    /// Name of the tool that produced this observation
    pub tool_name: String,
    /// Whether the tool execution was successful
    pub success: bool,
}

impl From<&crate::core::ToolResult> for Observation {
    fn from(result: &crate::core::ToolResult) -> Self {
        Self {
            tool_name: result.tool_name.clone(),
            success: result.success,
        }
    }
}
