pub const REPORT_HTML: &str = r#"
<!doctype html>
<html lang="en" class="h-full">

<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>SnapFix · Report an issue</title>

  <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/css/all.min.css"
    crossorigin="anonymous" referrerpolicy="no-referrer" />
  <style type="text/tailwindcss">
    @theme {
      --color-fix-bg: #f8fafc;
      --color-fix-panel: #ffffff;
      --color-fix-accent: #0284c7;
      --color-fix-danger: #e11d48;
    }

    @layer base {
      html { @apply h-full; }
      body { @apply h-full bg-fix-bg text-slate-800; }
      [x-cloak] { display: none !important; }
    }

    @layer components {
      .map-frame {
        @apply relative overflow-hidden rounded-xl border border-slate-300 bg-slate-200 select-none;
        cursor: crosshair;
      }

      .map-tile {
        @apply absolute pointer-events-none;
        width: 256px;
        height: 256px;
      }

      .map-marker {
        @apply absolute pointer-events-none;
        width: 18px;
        height: 18px;
        margin-left: -9px;
        margin-top: -9px;
        border-radius: 50%;
        background: rgba(225, 29, 72, 0.95);
        border: 2px solid #fff;
        box-shadow: 0 0 8px rgba(15, 23, 42, 0.5);
      }

      .map-attribution {
        @apply absolute bottom-0 right-0 bg-white/80 px-1 text-[10px] text-slate-600;
      }

      .category-btn {
        @apply flex flex-col items-center gap-1 rounded-lg border px-3 py-2 text-sm transition;
      }
    }
  </style>
  <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
  <script defer src="https://cdn.jsdelivr.net/npm/alpinejs@3.13.5/dist/cdn.min.js" crossorigin="anonymous"></script>
</head>

<body x-data="snapfixForm()" x-init="init()">
  <main class="mx-auto flex max-w-5xl flex-col gap-6 p-6">
    <header class="flex items-center gap-3">
      <i class="fa-solid fa-camera text-2xl text-fix-accent"></i>
      <h1 class="text-2xl font-semibold">SnapFix</h1>
      <span class="text-sm text-slate-500">Report an issue in your neighbourhood</span>
    </header>

    <section class="grid gap-3 sm:grid-cols-4">
      <template x-for="cat in categories" :key="cat.id">
        <button type="button" class="category-btn"
          :class="category === cat.id ? 'border-fix-accent bg-sky-50 text-fix-accent' : 'border-slate-300 bg-white'"
          @click="category = cat.id">
          <i class="fa-solid" :class="cat.icon"></i>
          <span x-text="cat.label"></span>
        </button>
      </template>
    </section>

    <section class="grid gap-4 sm:grid-cols-2">
      <label class="flex flex-col gap-1 text-sm">
        Title
        <input type="text" x-model="title" class="rounded border border-slate-300 px-2 py-1" />
      </label>
      <label class="flex flex-col gap-1 text-sm">
        Photo
        <input type="file" accept="image/*" @change="imageName = $event.target.files[0]?.name ?? null"
          class="text-sm" />
      </label>
    </section>

    <section class="flex flex-col gap-3">
      <div class="flex flex-wrap items-end gap-3">
        <label class="flex flex-col gap-1 text-sm">
          Postal code
          <input type="text" x-model="postalCode" @keydown.enter.prevent="geocode()"
            class="w-32 rounded border border-slate-300 px-2 py-1" />
        </label>
        <button type="button" @click="geocode()" :disabled="busy"
          class="rounded bg-fix-accent px-4 py-1.5 text-sm font-medium text-white disabled:opacity-50">Go</button>
        <label class="flex flex-col gap-1 text-sm">
          Latitude
          <input type="text" :value="latText" @input.debounce.300ms="editCoordinates($event.target.value, null)"
            class="w-36 rounded border border-slate-300 px-2 py-1" />
        </label>
        <label class="flex flex-col gap-1 text-sm">
          Longitude
          <input type="text" :value="lngText" @input.debounce.300ms="editCoordinates(null, $event.target.value)"
            class="w-36 rounded border border-slate-300 px-2 py-1" />
        </label>
      </div>

      <div class="map-frame" x-ref="map" :style="`width:${width}px;height:${height}px`"
        @mousedown="startDrag($event)" @mousemove="drag($event)" @mouseup="endDrag($event)"
        @mouseleave="dragState.active = false" @wheel.prevent="wheel($event)">
        <template x-for="tile in tiles" :key="tile.url + tile.offset">
          <img class="map-tile" :src="tile.url" alt=""
            :style="`left:${tile.offset[0]}px;top:${tile.offset[1]}px`" />
        </template>
        <div class="map-marker" x-show="marker" x-cloak
          :style="marker ? `left:${marker[0]}px;top:${marker[1]}px` : ''"></div>
        <div class="map-attribution" x-text="attribution"></div>
      </div>
    </section>

    <footer class="flex items-center gap-4">
      <button type="button" @click="submit()"
        class="rounded bg-fix-accent px-5 py-2 font-medium text-white">Submit report</button>
      <span class="text-sm text-slate-500" x-text="status"></span>
    </footer>
  </main>

  <script>
    function snapfixForm() {
      return {
        session: null,
        revision: -1,
        categories: [
          { id: 'streetlight', label: 'Streetlight', icon: 'fa-lightbulb' },
          { id: 'pothole', label: 'Pothole', icon: 'fa-road' },
          { id: 'waste', label: 'Waste', icon: 'fa-trash' },
          { id: 'manhole', label: 'Manhole', icon: 'fa-circle-dot' },
        ],
        category: null,
        title: '',
        imageName: null,
        postalCode: '',
        latText: '',
        lngText: '',
        tiles: [],
        marker: null,
        attribution: '',
        zoom: 13,
        width: 800,
        height: 600,
        busy: false,
        status: '',
        dragState: { active: false, moved: false, x: 0, y: 0 },

        async init() {
          const res = await fetch('/sessions', { method: 'POST' });
          this.apply(await res.json());
          const events = new EventSource(`/sessions/${this.session}/events`);
          events.onmessage = (ev) => this.apply(JSON.parse(ev.data));
          window.addEventListener('beforeunload', () => {
            fetch(`/sessions/${this.session}`, { method: 'DELETE', keepalive: true });
          });
        },

        async call(path, body) {
          const res = await fetch(`/sessions/${this.session}${path}`, {
            method: 'POST',
            headers: { 'Content-Type': 'application/json' },
            body: JSON.stringify(body ?? null),
          });
          const data = await res.json();
          if (!res.ok) {
            throw new Error(data.error ?? res.statusText);
          }
          return data;
        },

        async apply(snapshot) {
          if (snapshot.revision <= this.revision) {
            return;
          }
          this.session = snapshot.id;
          this.revision = snapshot.revision;
          this.latText = snapshot.coordinates.lat_text;
          this.lngText = snapshot.coordinates.lng_text;
          this.postalCode = snapshot.postal_code;
          const map = snapshot.map;
          this.tiles = map.tiles;
          this.marker = map.marker_point;
          this.attribution = map.attribution;
          this.zoom = map.viewport.zoom;
          this.width = map.viewport.width;
          this.height = map.viewport.height;
          if (map.view.phase === 'recentering') {
            setTimeout(() => this.call('/view/settled').then((s) => this.apply(s)), 250);
          }
          if (snapshot.notice) {
            alert(snapshot.notice.message);
            this.apply(await this.call('/notice/ack'));
          }
        },

        async geocode() {
          this.busy = true;
          try {
            this.apply(await this.call('/geocode', { postal_code: this.postalCode }));
          } finally {
            this.busy = false;
          }
        },

        async editCoordinates(latitude, longitude) {
          this.apply(await this.call('/coordinates', { latitude, longitude }));
        },

        startDrag(ev) {
          this.dragState = { active: true, moved: false, x: ev.clientX, y: ev.clientY };
        },

        async drag(ev) {
          if (!this.dragState.active) {
            return;
          }
          const dx = ev.clientX - this.dragState.x;
          const dy = ev.clientY - this.dragState.y;
          if (Math.abs(dx) + Math.abs(dy) < 4) {
            return;
          }
          this.dragState = { active: true, moved: true, x: ev.clientX, y: ev.clientY };
          this.apply(await this.call('/view', { dx, dy }));
        },

        async endDrag(ev) {
          const wasClick = this.dragState.active && !this.dragState.moved;
          this.dragState.active = false;
          if (!wasClick) {
            return;
          }
          const rect = this.$refs.map.getBoundingClientRect();
          this.apply(await this.call('/click', { x: ev.clientX - rect.left, y: ev.clientY - rect.top }));
        },

        async wheel(ev) {
          const zoom = Math.max(0, Math.min(19, this.zoom + (ev.deltaY < 0 ? 1 : -1)));
          this.apply(await this.call('/view', { zoom }));
        },

        async submit() {
          if (!this.category) {
            this.status = 'Pick a category first';
            return;
          }
          try {
            const draft = await this.call('/submit', {
              title: this.title,
              category: this.category,
              image_name: this.imageName,
            });
            this.status = `Submitted at ${draft.latitude}, ${draft.longitude}`;
          } catch (err) {
            this.status = err.message;
          }
        },
      };
    }
  </script>
</body>

</html>
"#;
