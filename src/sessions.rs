// src/sessions.rs
//! Outgoing form sessions.
//!
//! Each open outgoing form in the console owns one session: the farmer's voucher
//! list, filter/sort/column state, whole-voucher selection and the allocation ledger.
//! Sessions live in memory, are bound to the bearer token that created them and are
//! swept after a period of inactivity.
//!
//! Locks are `std::sync` and are only held for the synchronous mutations below;
//! handlers release them before awaiting the backend.

use chrono::Local;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};
use uuid::Uuid;
use validator::Validate;
use crate::allocation::{
    self, bag_detail_at, bag_details_for_size, column_picker_sizes, filter_by_location, filter_by_variety, group_by_date,
    over_allocations, sort_by_voucher_number, unique_location_values, unique_size_names, unique_varieties,
    visible_sizes, AllocationKey, AllocationLedger, AllocationState, LedgerEntry, LocationFilters, UniqueLocations,
};
use crate::error::{ApiError, ApiResult};
use crate::models::{IncomingVoucher, Location, OutgoingFormValues, OutgoingPayload, SortOrder, UpdateFiltersRequest};
use crate::validator::{format_order_date, CustomValidate, ValidationResult};

pub type SharedSession = Arc<Mutex<OutgoingSession>>;

pub fn lock(session: &SharedSession) -> ApiResult<MutexGuard<'_, OutgoingSession>> {
    session.lock().map_err(|_| ApiError::lock_poisoned())
}

// ==================== SESSION ====================

#[derive(Debug)]
pub struct OutgoingSession {
    pub id: Uuid,
    farmer_storage_link_id: Option<String>,
    vouchers: Vec<IncomingVoucher>,
    loaded: bool,
    variety: String,
    location: LocationFilters,
    sort: SortOrder,
    visible_columns: Vec<String>,
    selected_vouchers: Vec<String>,
    ledger: AllocationLedger,
    submitting: bool,
    generation: u64,
    last_used: Instant,
}

impl OutgoingSession {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            farmer_storage_link_id: None,
            vouchers: Vec::new(),
            loaded: false,
            variety: String::new(),
            location: LocationFilters::default(),
            sort: SortOrder::Asc,
            visible_columns: Vec::new(),
            selected_vouchers: Vec::new(),
            ledger: AllocationLedger::new(),
            submitting: false,
            generation: 0,
            last_used: Instant::now(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ledger(&self) -> &AllocationLedger {
        &self.ledger
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    fn is_expired(&self, idle_timeout: Duration) -> bool {
        self.last_used.elapsed() > idle_timeout
    }

    // ---------- farmer / vouchers ----------

    /// Switches farmer and discards everything tied to the previous one.
    /// Returns the generation a voucher fetch must carry to be applied.
    pub fn change_farmer(&mut self, farmer_storage_link_id: &str) -> u64 {
        self.farmer_storage_link_id = Some(farmer_storage_link_id.trim().to_string());
        self.vouchers.clear();
        self.loaded = false;
        self.reset();
        self.generation += 1;
        self.generation
    }

    /// Farmer and generation for a refetch of the current voucher list
    pub fn begin_refresh(&self) -> ApiResult<(String, u64)> {
        match self.farmer_storage_link_id.as_deref() {
            Some(id) => Ok((id.to_string(), self.generation)),
            None => Err(ApiError::no_farmer_selected()),
        }
    }

    /// Stores fetched vouchers unless the session moved on since the fetch started
    pub fn apply_vouchers(&mut self, generation: u64, vouchers: Vec<IncomingVoucher>) -> bool {
        if generation != self.generation {
            log::debug!(
                "Session {}: discarding voucher fetch for generation {} (current {})",
                self.id, generation, self.generation
            );
            return false;
        }
        self.vouchers = vouchers;
        self.loaded = true;
        true
    }

    // ---------- filters / columns ----------

    pub fn update_filters(&mut self, request: &UpdateFiltersRequest) {
        if let Some(ref variety) = request.variety {
            self.variety = variety.trim().to_string();
        }
        if let Some(ref chamber) = request.chamber {
            self.location.chamber = chamber.trim().to_string();
        }
        if let Some(ref floor) = request.floor {
            self.location.floor = floor.trim().to_string();
        }
        if let Some(ref row) = request.row {
            self.location.row = row.trim().to_string();
        }
        if let Some(sort) = request.sort {
            self.sort = sort;
        }
    }

    pub fn toggle_column(&mut self, size: &str) {
        let size = size.trim();
        match self.visible_columns.iter().position(|s| s == size) {
            Some(pos) => {
                self.visible_columns.remove(pos);
            }
            None => self.visible_columns.push(size.to_string()),
        }
    }

    /// Sort back to ascending; filters, columns, selection and ledger cleared
    pub fn reset(&mut self) {
        self.variety.clear();
        self.location = LocationFilters::default();
        self.sort = SortOrder::Asc;
        self.visible_columns.clear();
        self.selected_vouchers.clear();
        self.ledger.clear();
    }

    /// Vouchers after variety and location filters, sorted by voucher number
    pub fn filtered_vouchers(&self) -> Vec<IncomingVoucher> {
        let by_variety = filter_by_variety(&self.vouchers, &self.variety);
        let mut filtered = filter_by_location(&by_variety, &self.location);
        sort_by_voucher_number(&mut filtered, self.sort);
        filtered
    }

    fn table_sizes(filtered: &[IncomingVoucher]) -> Vec<String> {
        unique_size_names(filtered)
    }

    pub fn visible_sizes(&self) -> Vec<String> {
        visible_sizes(&Self::table_sizes(&self.filtered_vouchers()), &self.visible_columns)
    }

    // ---------- allocations ----------

    /// Cell edit. Zero or negative clears the cell; a positive quantity must address a
    /// bag of a loaded voucher and fit in `u32`.
    pub fn set_allocation(&mut self, key: AllocationKey, quantity: i64) -> ApiResult<()> {
        let key = key.canonical();
        if quantity <= 0 {
            self.ledger.remove(&key);
            return Ok(());
        }
        let quantity = u32::try_from(quantity).map_err(|_| ApiError::quantity_out_of_range(quantity))?;
        self.check_bag_exists(&key)?;
        self.ledger.set_quantity(key, quantity);
        Ok(())
    }

    pub fn remove_allocation(&mut self, key: &AllocationKey) -> bool {
        self.ledger.remove(&key.clone().canonical())
    }

    fn check_bag_exists(&self, key: &AllocationKey) -> ApiResult<()> {
        let voucher = self
            .vouchers
            .iter()
            .find(|v| v.id == key.voucher_id)
            .ok_or_else(|| ApiError::not_found("Incoming gate pass"))?;
        match bag_detail_at(voucher, &key.size_name, key.bag_index) {
            Some(_) => Ok(()),
            None => Err(ApiError::unknown_bag(voucher.number(), &key.size_name, key.bag_index)),
        }
    }

    /// Whole-voucher selection. Returns the new selected state.
    ///
    /// Selecting fills the ledger for the visible size columns, and only when the
    /// voucher is currently shown in the table.
    pub fn toggle_voucher(&mut self, voucher_id: &str) -> ApiResult<bool> {
        if !self.vouchers.iter().any(|v| v.id == voucher_id) {
            return Err(ApiError::not_found("Incoming gate pass"));
        }

        let selecting = !self.selected_vouchers.iter().any(|id| id == voucher_id);
        if selecting {
            self.selected_vouchers.push(voucher_id.to_string());
            let filtered = self.filtered_vouchers();
            if let Some(voucher) = filtered.iter().find(|v| v.id == voucher_id) {
                let sizes = visible_sizes(&Self::table_sizes(&filtered), &self.visible_columns);
                self.ledger.toggle_voucher(voucher, true, &sizes);
            }
        } else {
            self.selected_vouchers.retain(|id| id != voucher_id);
            self.ledger.remove_voucher(voucher_id);
        }
        Ok(selecting)
    }

    // ---------- review / submit ----------

    /// Form and ledger checks that must pass before a payload is built
    pub fn validate_submission(&self, form: &mut OutgoingFormValues) -> ApiResult<ValidationResult> {
        let farmer = self
            .farmer_storage_link_id
            .as_deref()
            .ok_or_else(ApiError::no_farmer_selected)?;

        if form.farmer_storage_link_id.trim().is_empty() {
            form.farmer_storage_link_id = farmer.to_string();
        } else if form.farmer_storage_link_id.trim() != farmer {
            return Err(ApiError::ValidationError(
                "Selected farmer does not match the vouchers table".to_string(),
            ));
        }

        form.validate()?;
        let result = form.custom_validate();
        if !result.is_valid() {
            return Err(result.to_api_error());
        }

        if self.ledger.is_empty() {
            return Err(ApiError::no_allocations());
        }

        if let Some(over) = over_allocations(&self.ledger, &self.vouchers).first() {
            return Err(over.to_api_error());
        }

        Ok(result)
    }

    pub fn build_payload(&self, form: &OutgoingFormValues, gate_pass_no: i64) -> ApiResult<OutgoingPayload> {
        allocation::payload::build(form, gate_pass_no, &self.ledger, &self.vouchers)?
            .ok_or_else(ApiError::no_allocations)
    }

    /// Marks the session as submitting. A second call before `finish_submission` is a conflict.
    pub fn begin_submission(&mut self, form: &mut OutgoingFormValues) -> ApiResult<ValidationResult> {
        if self.submitting {
            return Err(ApiError::submission_in_progress());
        }
        let result = self.validate_submission(form)?;
        self.submitting = true;
        Ok(result)
    }

    /// Clears the in-flight flag. A successful submission empties the ledger and selection.
    pub fn finish_submission(&mut self, succeeded: bool) {
        self.submitting = false;
        if succeeded {
            // Stock quantities changed on the backend; the old list must not be reused
            self.ledger.clear();
            self.selected_vouchers.clear();
            self.vouchers.clear();
            self.loaded = false;
            self.generation += 1;
        }
    }

    // ---------- view ----------

    pub fn view(&self) -> SessionView {
        let filtered = self.filtered_vouchers();
        let table_sizes = Self::table_sizes(&filtered);
        let all_sizes = unique_size_names(&self.vouchers);
        let shown_sizes = visible_sizes(&table_sizes, &self.visible_columns);

        let groups = group_by_date(&filtered, self.sort)
            .into_iter()
            .map(|group| VoucherGroupView {
                date_key: group.date_key,
                label: group.label,
                vouchers: group
                    .vouchers
                    .iter()
                    .map(|v| self.voucher_row(v, &shown_sizes))
                    .collect(),
            })
            .collect();

        let mut warnings: Vec<String> = over_allocations(&self.ledger, &self.vouchers)
            .iter()
            .map(|o| o.message())
            .collect();
        warnings.extend(self.unfilled_selection_warnings());

        SessionView {
            id: self.id,
            farmer_storage_link_id: self.farmer_storage_link_id.clone(),
            default_order_date: format_order_date(Local::now().date_naive()),
            generation: self.generation(),
            loaded: self.loaded,
            filters: FiltersView {
                variety: self.variety.clone(),
                chamber: self.location.chamber.clone(),
                floor: self.location.floor.clone(),
                row: self.location.row.clone(),
                sort: self.sort,
            },
            varieties: unique_varieties(&self.vouchers),
            locations: unique_location_values(&self.vouchers),
            column_picker_sizes: column_picker_sizes(&table_sizes, &all_sizes),
            visible_columns: self.visible_columns.clone(),
            visible_sizes: shown_sizes,
            table_sizes,
            groups,
            selected_vouchers: self.selected_vouchers.clone(),
            allocations: self.ledger().entries(),
            total_allocated: self.ledger().total_quantity(),
            warnings,
            submitting: self.is_submitting(),
        }
    }

    /// Selected vouchers with nothing in the ledger, e.g. selected while filtered out
    fn unfilled_selection_warnings(&self) -> Vec<String> {
        self.selected_vouchers
            .iter()
            .filter(|id| !self.ledger.has_voucher(id))
            .filter_map(|id| self.vouchers.iter().find(|v| v.id == **id))
            .map(|v| format!("Voucher #{} is selected but no bags are allocated from it", v.number()))
            .collect()
    }

    fn voucher_row(&self, voucher: &IncomingVoucher, sizes: &[String]) -> VoucherRowView {
        let cells = sizes
            .iter()
            .map(|size| SizeCellView {
                size: size.clone(),
                bags: bag_details_for_size(voucher, size)
                    .into_iter()
                    .map(|detail| {
                        let key = AllocationKey::new(&voucher.id, size, detail.bag_index);
                        BagCellView {
                            allocation: self.ledger.get(&key),
                            key: key.encode(),
                            bag_index: detail.bag_index,
                            initial_quantity: detail.initial_quantity,
                            current_quantity: detail.current_quantity,
                            location: detail.location,
                        }
                    })
                    .collect(),
            })
            .collect();

        VoucherRowView {
            id: voucher.id.clone(),
            voucher_no: voucher.number(),
            variety: voucher.variety.clone(),
            truck_number: voucher.truck_number.clone(),
            total_initial: voucher.total_initial(),
            total_current: voucher.total_current(),
            selected: self.selected_vouchers.contains(&voucher.id),
            has_allocations: self.ledger.has_voucher(&voucher.id),
            cells,
        }
    }
}

// ==================== VIEW ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FiltersView {
    pub variety: String,
    pub chamber: String,
    pub floor: String,
    pub row: String,
    pub sort: SortOrder,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BagCellView {
    pub key: String,
    pub bag_index: usize,
    pub initial_quantity: u32,
    pub current_quantity: u32,
    pub location: Option<Location>,
    pub allocation: AllocationState,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeCellView {
    pub size: String,
    pub bags: Vec<BagCellView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherRowView {
    pub id: String,
    pub voucher_no: i64,
    pub variety: String,
    pub truck_number: Option<String>,
    pub total_initial: u64,
    pub total_current: u64,
    pub selected: bool,
    pub has_allocations: bool,
    pub cells: Vec<SizeCellView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherGroupView {
    pub date_key: String,
    pub label: String,
    pub vouchers: Vec<VoucherRowView>,
}

/// Everything the console needs to render the outgoing vouchers table
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub farmer_storage_link_id: Option<String>,
    /// Today as dd.mm.yyyy, used to prefill the order date
    pub default_order_date: String,
    pub generation: u64,
    pub loaded: bool,
    pub filters: FiltersView,
    pub varieties: Vec<String>,
    pub locations: UniqueLocations,
    pub table_sizes: Vec<String>,
    pub visible_sizes: Vec<String>,
    pub column_picker_sizes: Vec<String>,
    pub visible_columns: Vec<String>,
    pub groups: Vec<VoucherGroupView>,
    pub selected_vouchers: Vec<String>,
    pub allocations: Vec<LedgerEntry>,
    pub total_allocated: u64,
    pub warnings: Vec<String>,
    pub submitting: bool,
}

// ==================== SUBMISSION GUARD ====================

/// Clears the submitting flag when dropped, so an aborted request never leaves a session locked out
pub struct SubmissionGuard {
    session: SharedSession,
    succeeded: bool,
}

impl SubmissionGuard {
    pub fn new(session: SharedSession) -> Self {
        Self { session, succeeded: false }
    }

    pub fn succeed(mut self) {
        self.succeeded = true;
    }
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        match self.session.lock() {
            Ok(mut session) => session.finish_submission(self.succeeded),
            Err(_) => log::error!("Submission finished on a poisoned session lock"),
        }
    }
}

// ==================== STORE ====================

struct StoredSession {
    owner_token: String,
    session: SharedSession,
}

pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, StoredSession>>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
            max_sessions,
        }
    }

    pub fn create(&self, owner_token: &str) -> ApiResult<(Uuid, SharedSession)> {
        if self.len()? >= self.max_sessions {
            self.sweep_expired()?;
        }

        let mut sessions = self.sessions.write().map_err(|_| ApiError::lock_poisoned())?;
        if sessions.len() >= self.max_sessions {
            log::warn!("Session limit reached ({} open outgoing forms)", sessions.len());
            return Err(ApiError::Conflict(
                "Too many open outgoing forms, close one and try again".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(OutgoingSession::new(id)));
        sessions.insert(id, StoredSession {
            owner_token: owner_token.to_string(),
            session: session.clone(),
        });
        log::info!("Outgoing session {} opened", id);
        Ok((id, session))
    }

    /// Session by id; sessions created with another token are reported as missing
    pub fn get(&self, id: &str, token: &str) -> ApiResult<SharedSession> {
        let uuid = Uuid::parse_str(id).map_err(|_| ApiError::session_not_found(id))?;
        let session = {
            let sessions = self.sessions.read().map_err(|_| ApiError::lock_poisoned())?;
            match sessions.get(&uuid) {
                Some(stored) if stored.owner_token == token => stored.session.clone(),
                _ => return Err(ApiError::session_not_found(id)),
            }
        };
        lock(&session)?.touch();
        Ok(session)
    }

    pub fn remove(&self, id: &str, token: &str) -> ApiResult<()> {
        let uuid = Uuid::parse_str(id).map_err(|_| ApiError::session_not_found(id))?;
        let mut sessions = self.sessions.write().map_err(|_| ApiError::lock_poisoned())?;
        match sessions.get(&uuid) {
            Some(stored) if stored.owner_token == token => {
                sessions.remove(&uuid);
                log::info!("Outgoing session {} closed", uuid);
                Ok(())
            }
            _ => Err(ApiError::session_not_found(id)),
        }
    }

    /// Drops sessions idle for longer than the timeout. Sessions mid-submission are kept.
    pub fn sweep_expired(&self) -> ApiResult<usize> {
        let mut sessions = self.sessions.write().map_err(|_| ApiError::lock_poisoned())?;
        let before = sessions.len();
        let idle_timeout = self.idle_timeout;
        sessions.retain(|_, stored| match stored.session.lock() {
            Ok(session) => session.submitting || !session.is_expired(idle_timeout),
            Err(_) => false,
        });
        Ok(before - sessions.len())
    }

    pub fn len(&self) -> ApiResult<usize> {
        Ok(self.sessions.read().map_err(|_| ApiError::lock_poisoned())?.len())
    }
}
